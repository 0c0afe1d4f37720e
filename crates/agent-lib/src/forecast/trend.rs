//! Linear trend backend
//!
//! Ordinary least squares of value against elapsed seconds, with no
//! seasonal terms. The window spans minutes, so a trend line is all the
//! structure there is to fit.

use super::{FittedModel, ModelBackend};
use crate::error::ModelFitError;
use crate::models::{Metric, SeriesPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of samples required for a trend fit
pub const MIN_SAMPLES: usize = 2;

/// Least-squares linear trend model
#[derive(Debug, Clone)]
pub struct LinearTrendModel {
    min_samples: usize,
}

impl Default for LinearTrendModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearTrendModel {
    pub fn new() -> Self {
        Self {
            min_samples: MIN_SAMPLES,
        }
    }

    /// Require more samples than the mathematical minimum
    pub fn with_min_samples(min_samples: usize) -> Self {
        Self {
            min_samples: min_samples.max(MIN_SAMPLES),
        }
    }
}

/// Trained trend parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub backend: String,
    pub metric: Metric,
    /// Instant that elapsed seconds are measured from
    pub origin: DateTime<Utc>,
    pub intercept: f64,
    pub slope_per_second: f64,
    /// Standard deviation of in-sample residuals
    pub residual_std: f64,
    pub samples: usize,
    pub fitted_at: DateTime<Utc>,
}

impl FittedModel for TrendFit {
    fn predict(&self, at: DateTime<Utc>) -> f64 {
        self.intercept + self.slope_per_second * elapsed_secs(self.origin, at)
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl ModelBackend for LinearTrendModel {
    fn name(&self) -> &str {
        "linear_trend"
    }

    fn min_samples(&self) -> usize {
        self.min_samples
    }

    fn fit(
        &self,
        metric: Metric,
        series: &[SeriesPoint],
    ) -> Result<Box<dyn FittedModel>, ModelFitError> {
        if series.len() < self.min_samples {
            return Err(ModelFitError::InsufficientData {
                metric,
                samples: series.len(),
                required: self.min_samples,
            });
        }

        if let Some(bad) = series.iter().find(|p| !p.value.is_finite()) {
            return Err(ModelFitError::Degenerate {
                metric,
                reason: format!("non-finite value {} at {}", bad.value, bad.timestamp),
            });
        }

        let origin = series[0].timestamp;
        let xs: Vec<f64> = series
            .iter()
            .map(|p| elapsed_secs(origin, p.timestamp))
            .collect();
        let ys: Vec<f64> = series.iter().map(|p| p.value).collect();

        let (intercept, slope) =
            linear_regression(&xs, &ys).ok_or_else(|| ModelFitError::Degenerate {
                metric,
                reason: "timestamps do not span any time".to_string(),
            })?;

        let n = ys.len();
        let sse: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let residual_std = if n > 2 {
            (sse / (n - 2) as f64).sqrt()
        } else {
            0.0
        };

        Ok(Box::new(TrendFit {
            backend: self.name().to_string(),
            metric,
            origin,
            intercept,
            slope_per_second: slope,
            residual_std,
            samples: n,
            fitted_at: Utc::now(),
        }))
    }
}

fn elapsed_secs(origin: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - origin).num_milliseconds() as f64 / 1000.0
}

/// Least-squares fit of `ys` against `xs`, returning `(intercept, slope)`.
///
/// Returns `None` when `xs` has no spread.
pub(crate) fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx.abs() < f64::EPSILON {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = sxy / sxx;
    Some((mean_y - slope * mean_x, slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(values: &[f64], spacing_secs: i64) -> Vec<SeriesPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::new(start + Duration::seconds(i as i64 * spacing_secs), *v))
            .collect()
    }

    #[test]
    fn test_linear_regression() {
        let xs = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = vec![1.0, 3.0, 5.0, 7.0, 9.0];
        let (intercept, slope) = linear_regression(&xs, &ys).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_regression_no_spread() {
        assert!(linear_regression(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(linear_regression(&[], &[]).is_none());
    }

    #[test]
    fn test_fit_recovers_trend() {
        let points = series(&[20.0, 20.5, 21.0, 21.5, 22.0], 10);
        let model = LinearTrendModel::new().fit(Metric::Temperature, &points).unwrap();

        let next = points[4].timestamp + Duration::seconds(10);
        assert!((model.predict(next) - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_samples() {
        let points = series(&[20.0], 10);
        let err = LinearTrendModel::new()
            .fit(Metric::Humidity, &points)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelFitError::InsufficientData { samples: 1, required: 2, .. }
        ));
    }

    #[test]
    fn test_identical_timestamps_are_degenerate() {
        let points = series(&[20.0, 21.0, 22.0], 0);
        let err = LinearTrendModel::new().fit(Metric::Carbon, &points).unwrap_err();
        assert!(matches!(err, ModelFitError::Degenerate { .. }));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let points = series(&[20.0, f64::NAN, 22.0], 10);
        let err = LinearTrendModel::new().fit(Metric::Carbon, &points).unwrap_err();
        assert!(matches!(err, ModelFitError::Degenerate { .. }));
    }

    #[test]
    fn test_fit_serializes() {
        let points = series(&[400.0, 410.0, 420.0], 10);
        let model = LinearTrendModel::new().fit(Metric::Carbon, &points).unwrap();
        let json: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
        assert_eq!(json["backend"], "linear_trend");
        assert_eq!(json["metric"], "carbon");
        assert_eq!(json["samples"], 3);
    }
}
