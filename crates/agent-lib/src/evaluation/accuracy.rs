//! Forecast accuracy against realized samples
//!
//! Each forecast point is paired with the nearest actual sample by
//! timestamp. Pairs further apart than the tolerance are dropped rather
//! than scored.

use crate::models::{AccuracyReport, SeriesPoint};
use std::time::Duration;

/// Default maximum distance between a forecast point and its actual sample
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(30);

/// Outcome of comparing one forecast with realized data
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub report: AccuracyReport,
    /// Mean of `actual - predicted` over aligned pairs. Positive means the
    /// model under-predicted. Zero when nothing aligned, `None` only when the
    /// mean is not a finite number.
    pub mean_residual: Option<f64>,
    /// Number of forecast points that found an actual sample
    pub aligned: usize,
}

/// Nearest-neighbour alignment and error statistics
#[derive(Debug, Clone)]
pub struct AccuracyEvaluator {
    tolerance: Duration,
}

impl Default for AccuracyEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl AccuracyEvaluator {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Compare `forecast` with `actual`. Both must be ordered by timestamp.
    pub fn evaluate(&self, forecast: &[SeriesPoint], actual: &[SeriesPoint]) -> Evaluation {
        let pairs: Vec<(f64, f64)> = forecast
            .iter()
            .filter_map(|f| self.nearest(f, actual).map(|a| (a.value, f.value)))
            .collect();

        if pairs.is_empty() {
            return Evaluation {
                report: AccuracyReport::default(),
                mean_residual: Some(0.0),
                aligned: 0,
            };
        }

        let n = pairs.len() as f64;
        let residuals: Vec<f64> = pairs.iter().map(|(t, p)| t - p).collect();

        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
        let mse = residuals.iter().map(|r| r.powi(2)).sum::<f64>() / n;
        let mape = if pairs.iter().all(|(t, _)| *t != 0.0) {
            Some(
                pairs
                    .iter()
                    .map(|(t, p)| ((t - p) / t).abs())
                    .sum::<f64>()
                    / n
                    * 100.0,
            )
        } else {
            None
        };
        let mean = residuals.iter().sum::<f64>() / n;

        Evaluation {
            report: AccuracyReport {
                mae: Some(mae),
                mse: Some(mse),
                rmse: Some(mse.sqrt()),
                mape,
            },
            mean_residual: mean.is_finite().then_some(mean),
            aligned: pairs.len(),
        }
    }

    /// Nearest actual sample within tolerance. Ties go to the earlier sample.
    fn nearest<'a>(&self, point: &SeriesPoint, actual: &'a [SeriesPoint]) -> Option<&'a SeriesPoint> {
        let at = point.timestamp;
        let after = actual.partition_point(|a| a.timestamp <= at);
        let backward = after.checked_sub(1).map(|i| &actual[i]);
        let forward = actual[actual.partition_point(|a| a.timestamp < at)..].first();

        let distance = |a: &SeriesPoint| (a.timestamp - at).num_milliseconds().unsigned_abs();

        let best = match (backward, forward) {
            (Some(b), Some(f)) => {
                if distance(b) <= distance(f) {
                    b
                } else {
                    f
                }
            }
            (Some(b), None) => b,
            (None, Some(f)) => f,
            (None, None) => return None,
        };

        (distance(best) <= self.tolerance.as_millis() as u64).then_some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn at(secs: i64, value: f64) -> SeriesPoint {
        SeriesPoint::new(t0() + ChronoDuration::seconds(secs), value)
    }

    #[test]
    fn test_pairs_within_tolerance() {
        let evaluator = AccuracyEvaluator::default();
        let forecast = vec![at(0, 10.0)];
        let actual = vec![at(20, 12.0)];

        let eval = evaluator.evaluate(&forecast, &actual);
        assert_eq!(eval.aligned, 1);
        assert_eq!(eval.report.mae, Some(2.0));
        assert_eq!(eval.mean_residual, Some(2.0));
    }

    #[test]
    fn test_drops_pairs_outside_tolerance() {
        let evaluator = AccuracyEvaluator::default();
        let forecast = vec![at(0, 10.0), at(60, 10.0)];
        let actual = vec![at(40, 100.0), at(70, 11.0)];

        let eval = evaluator.evaluate(&forecast, &actual);
        // Only the second forecast point aligns; the 40s-away sample contributes nothing
        assert_eq!(eval.aligned, 1);
        assert_eq!(eval.report.mae, Some(1.0));
        assert_eq!(eval.report.mse, Some(1.0));
        assert_eq!(eval.mean_residual, Some(1.0));
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let evaluator = AccuracyEvaluator::default();
        let eval = evaluator.evaluate(&[at(0, 1.0)], &[at(30, 2.0)]);
        assert_eq!(eval.aligned, 1);
    }

    #[test]
    fn test_nearest_neighbour_selection() {
        let evaluator = AccuracyEvaluator::default();
        let actual = vec![at(-25, 1.0), at(5, 2.0), at(28, 3.0)];

        let eval = evaluator.evaluate(&[at(0, 2.0)], &actual);
        assert_eq!(eval.report.mae, Some(0.0));

        // Equidistant candidates resolve to the earlier sample
        let eval = evaluator.evaluate(&[at(0, 0.0)], &[at(-10, 4.0), at(10, 8.0)]);
        assert_eq!(eval.mean_residual, Some(4.0));
    }

    #[test]
    fn test_no_pairs_gives_empty_report_and_zero_residual() {
        let evaluator = AccuracyEvaluator::default();
        let eval = evaluator.evaluate(&[at(0, 1.0)], &[at(300, 1.0)]);
        assert!(eval.report.is_empty());
        assert_eq!(eval.mean_residual, Some(0.0));
        assert_eq!(eval.aligned, 0);

        let eval = evaluator.evaluate(&[at(0, 1.0)], &[]);
        assert!(eval.report.is_empty());
        assert_eq!(eval.mean_residual, Some(0.0));
    }

    #[test]
    fn test_mape_undefined_when_true_value_is_zero() {
        let evaluator = AccuracyEvaluator::default();
        let forecast = vec![at(0, 1.0), at(60, 3.0)];
        let actual = vec![at(0, 0.0), at(60, 4.0)];

        let eval = evaluator.evaluate(&forecast, &actual);
        assert_eq!(eval.report.mape, None);
        assert_eq!(eval.report.mae, Some(1.0));
        assert_eq!(eval.report.mse, Some(1.0));
        assert_eq!(eval.report.rmse, Some(1.0));
    }

    #[test]
    fn test_error_statistics() {
        let evaluator = AccuracyEvaluator::default();
        let forecast = vec![at(0, 9.0), at(60, 22.0)];
        let actual = vec![at(0, 10.0), at(60, 20.0)];

        let eval = evaluator.evaluate(&forecast, &actual);
        assert_eq!(eval.report.mae, Some(1.5));
        assert_eq!(eval.report.mse, Some(2.5));
        assert!((eval.report.rmse.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
        // (10% + 10%) / 2
        assert!((eval.report.mape.unwrap() - 10.0).abs() < 1e-9);
        // (+1 - 2) / 2
        assert_eq!(eval.mean_residual, Some(-0.5));
    }

    #[test]
    fn test_non_finite_residual_is_undefined() {
        let evaluator = AccuracyEvaluator::default();
        let eval = evaluator.evaluate(&[at(0, 1.0)], &[at(0, f64::NAN)]);
        assert_eq!(eval.aligned, 1);
        assert_eq!(eval.mean_residual, None);
    }
}
