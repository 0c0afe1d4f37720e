//! Residual bias correction

use crate::models::SeriesPoint;

/// Additive per-metric forecast correction.
///
/// The corrector holds no state; the orchestrator stores the current bias
/// between cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiasCorrector;

impl BiasCorrector {
    /// Shift every point of `raw` by `bias`, keeping timestamps
    pub fn apply_correction(raw: &[SeriesPoint], bias: f64) -> Vec<SeriesPoint> {
        raw.iter()
            .map(|p| SeriesPoint::new(p.timestamp, p.value + bias))
            .collect()
    }

    /// Next bias: the fresh mean residual when it is a finite number,
    /// otherwise the previous bias
    pub fn update_bias(previous: f64, mean_residual: Option<f64>) -> f64 {
        match mean_residual {
            Some(residual) if residual.is_finite() => residual,
            _ => previous,
        }
    }
}
