//! Forecast engine
//!
//! Runs a backend fit on the blocking pool, bounded by a timeout, and
//! projects the fitted model over the forecast horizon.

use super::{FittedModel, ModelBackend};
use crate::error::ModelFitError;
use crate::models::{Metric, SeriesPoint};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default number of forecast steps
pub const DEFAULT_HORIZON: usize = 5;

/// Default spacing between forecast steps
pub const DEFAULT_STEP: Duration = Duration::from_secs(60);

/// Default upper bound on a single model fit
pub const DEFAULT_FIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the forecast engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Spacing between consecutive forecast timestamps
    pub step: Duration,
    /// Maximum time a fit may take before it is abandoned
    pub fit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            fit_timeout: DEFAULT_FIT_TIMEOUT,
        }
    }
}

/// Model output for one metric, before bias correction
#[derive(Debug, Clone)]
pub struct RawForecast {
    pub metric: Metric,
    pub points: Vec<SeriesPoint>,
    pub model: Arc<dyn FittedModel>,
    pub fit_duration: Duration,
}

/// Stateless wrapper around a model backend
#[derive(Clone)]
pub struct ForecastEngine {
    backend: Arc<dyn ModelBackend>,
    config: EngineConfig,
}

impl ForecastEngine {
    pub fn new(backend: Arc<dyn ModelBackend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fit on `series` and predict `horizon` steps past its last timestamp
    pub async fn forecast(
        &self,
        metric: Metric,
        series: Vec<SeriesPoint>,
        horizon: usize,
    ) -> Result<RawForecast, ModelFitError> {
        let last = match series.last() {
            Some(p) => p.timestamp,
            None => {
                return Err(ModelFitError::InsufficientData {
                    metric,
                    samples: 0,
                    required: self.backend.min_samples(),
                })
            }
        };

        let start = Instant::now();
        let backend = Arc::clone(&self.backend);
        let handle = tokio::task::spawn_blocking(move || backend.fit(metric, &series));

        let model: Arc<dyn FittedModel> =
            match tokio::time::timeout(self.config.fit_timeout, handle).await {
                Ok(Ok(result)) => Arc::from(result?),
                Ok(Err(join_err)) => {
                    return Err(ModelFitError::Aborted {
                        metric,
                        reason: join_err.to_string(),
                    })
                }
                Err(_) => {
                    warn!(
                        metric = %metric,
                        timeout_ms = self.config.fit_timeout.as_millis() as u64,
                        "Model fit timed out"
                    );
                    return Err(ModelFitError::Timeout {
                        metric,
                        timeout_ms: self.config.fit_timeout.as_millis() as u64,
                    });
                }
            };
        let fit_duration = start.elapsed();

        let points = project(metric, last, self.config.step, horizon, model.as_ref())?;

        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(ModelFitError::Degenerate {
                metric,
                reason: format!("model predicted {} at {}", bad.value, bad.timestamp),
            });
        }

        debug!(
            metric = %metric,
            backend = %self.backend.name(),
            horizon = horizon,
            fit_ms = fit_duration.as_millis() as u64,
            "Forecast generated"
        );

        Ok(RawForecast {
            metric,
            points,
            model,
            fit_duration,
        })
    }
}

/// Evaluate `model` at `horizon` evenly spaced instants after `last`
fn project(
    metric: Metric,
    last: DateTime<Utc>,
    step: Duration,
    horizon: usize,
    model: &dyn FittedModel,
) -> Result<Vec<SeriesPoint>, ModelFitError> {
    let out_of_range = || ModelFitError::Degenerate {
        metric,
        reason: format!("forecast timestamps past {} are out of range", last),
    };
    let step = chrono::Duration::from_std(step).map_err(|_| out_of_range())?;

    let mut points = Vec::with_capacity(horizon);
    let mut at = last;
    for _ in 0..horizon {
        at = at.checked_add_signed(step).ok_or_else(out_of_range)?;
        points.push(SeriesPoint::new(at, model.predict(at)));
    }
    Ok(points)
}
