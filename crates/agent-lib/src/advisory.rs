//! Advisory text derived from the corrected forecast
//!
//! Stateless threshold mapping: one line per metric that has a forecast.

use crate::models::Metric;
use serde::{Deserialize, Serialize};

/// Corrected near-term values handed to the advisor. A metric that has
/// never produced a forecast is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvisoryInput {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub carbon: Option<f64>,
}

impl AdvisoryInput {
    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Temperature => self.temperature = Some(value),
            Metric::Humidity => self.humidity = Some(value),
            Metric::Carbon => self.carbon = Some(value),
        }
    }
}

/// Trait for advisory text generation
pub trait Advisor: Send + Sync {
    fn advise(&self, input: &AdvisoryInput) -> Vec<String>;
}

/// Thresholds for the default advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryThresholds {
    /// Degrees Celsius above which heat is severe
    pub temperature_very_high: f64,
    /// Degrees Celsius above which it is hot
    pub temperature_high: f64,
    /// Relative humidity percent above which air is damp
    pub humidity_high: f64,
    /// Relative humidity percent below which air is dry
    pub humidity_low: f64,
    /// CO2 ppm above which ventilation is urgent
    pub carbon_high: f64,
    /// CO2 ppm above which circulation should improve
    pub carbon_moderate: f64,
}

impl Default for AdvisoryThresholds {
    fn default() -> Self {
        Self {
            temperature_very_high: 38.0,
            temperature_high: 30.0,
            humidity_high: 75.0,
            humidity_low: 30.0,
            carbon_high: 600.0,
            carbon_moderate: 450.0,
        }
    }
}

/// Fixed-threshold advisor
#[derive(Debug, Clone, Default)]
pub struct ThresholdAdvisor {
    thresholds: AdvisoryThresholds,
}

impl ThresholdAdvisor {
    pub fn new(thresholds: AdvisoryThresholds) -> Self {
        Self { thresholds }
    }

    fn temperature(&self, value: f64) -> &'static str {
        if value > self.thresholds.temperature_very_high {
            "Temperature is very high. Ensure cooling and hydration."
        } else if value > self.thresholds.temperature_high {
            "It's hot. Consider lighter activities."
        } else {
            "Temperature levels are comfortable."
        }
    }

    fn humidity(&self, value: f64) -> &'static str {
        if value > self.thresholds.humidity_high {
            "High humidity can feel uncomfortable and promote mold."
        } else if value < self.thresholds.humidity_low {
            "Air is dry. A humidifier might be useful."
        } else {
            "Humidity is within a comfortable range."
        }
    }

    fn carbon(&self, value: f64) -> &'static str {
        if value > self.thresholds.carbon_high {
            "High CO₂ detected! Ventilate the area immediately."
        } else if value > self.thresholds.carbon_moderate {
            "CO₂ levels are moderate. Consider increasing air circulation."
        } else {
            "Air quality is excellent."
        }
    }
}

impl Advisor for ThresholdAdvisor {
    fn advise(&self, input: &AdvisoryInput) -> Vec<String> {
        let mut advice = Vec::with_capacity(3);
        if let Some(t) = input.temperature {
            advice.push(self.temperature(t).to_string());
        }
        if let Some(h) = input.humidity {
            advice.push(self.humidity(h).to_string());
        }
        if let Some(c) = input.carbon {
            advice.push(self.carbon(c).to_string());
        }
        advice
    }
}
