//! Core data models for the telemetry agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp format used in published forecast payloads
pub const PAYLOAD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Environmental metric tracked by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
    Carbon,
}

impl Metric {
    /// All tracked metrics, in cycle order
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Carbon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Carbon => "carbon",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" => Ok(Metric::Temperature),
            "humidity" => Ok(Metric::Humidity),
            "carbon" | "co2" => Ok(Metric::Carbon),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

/// A single sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub carbon: f64,
}

impl Sample {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Carbon => self.carbon,
        }
    }
}

/// A timestamped scalar, the unit exchanged with the forecasting backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One forecast step, holding both the model output and the bias-corrected value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub raw_value: f64,
    pub corrected_value: f64,
}

impl ForecastPoint {
    pub fn raw(&self) -> SeriesPoint {
        SeriesPoint::new(self.timestamp, self.raw_value)
    }

    pub fn corrected(&self) -> SeriesPoint {
        SeriesPoint::new(self.timestamp, self.corrected_value)
    }
}

/// Error statistics of a forecast against realized samples.
///
/// Fields are `None` when no forecast point could be aligned, and `mape`
/// is additionally `None` when any aligned true value is exactly zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    #[serde(rename = "MAE")]
    pub mae: Option<f64>,
    #[serde(rename = "MSE")]
    pub mse: Option<f64>,
    #[serde(rename = "RMSE")]
    pub rmse: Option<f64>,
    #[serde(rename = "MAPE")]
    pub mape: Option<f64>,
}

impl AccuracyReport {
    pub fn is_empty(&self) -> bool {
        self.mae.is_none() && self.mse.is_none() && self.rmse.is_none() && self.mape.is_none()
    }
}

/// Per-metric additive forecast correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasState {
    values: BTreeMap<Metric, f64>,
}

impl Default for BiasState {
    fn default() -> Self {
        Self {
            values: Metric::ALL.iter().map(|m| (*m, 0.0)).collect(),
        }
    }
}

impl BiasState {
    pub fn get(&self, metric: Metric) -> f64 {
        self.values.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, metric: Metric, bias: f64) {
        self.values.insert(metric, bias);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(m, b)| (*m, *b))
    }
}

/// Published forecast entry (corrected values only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPoint {
    pub timestamp: String,
    pub value: f64,
}

impl From<&ForecastPoint> for PublishedPoint {
    fn from(point: &ForecastPoint) -> Self {
        Self {
            timestamp: point
                .timestamp
                .format(PAYLOAD_TIMESTAMP_FORMAT)
                .to_string(),
            value: point.corrected_value,
        }
    }
}

/// Forecast payload: metric name to corrected series
pub type ForecastPayload = BTreeMap<String, Vec<PublishedPoint>>;

/// Accuracy payload: metric name to report
pub type AccuracyPayload = BTreeMap<String, AccuracyReport>;
