//! Short-horizon forecasting
//!
//! The engine fits a model per metric on the current window and projects
//! it a fixed number of steps past the newest sample. Model fitting is
//! pluggable through [`ModelBackend`].

mod engine;
mod trend;

pub use engine::{
    EngineConfig, ForecastEngine, RawForecast, DEFAULT_FIT_TIMEOUT, DEFAULT_HORIZON,
    DEFAULT_STEP,
};
pub use trend::{LinearTrendModel, TrendFit, MIN_SAMPLES};

use crate::error::ModelFitError;
use crate::models::{Metric, SeriesPoint};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Trait for model fitting implementations
pub trait ModelBackend: Send + Sync {
    /// Backend identifier, recorded in persisted artifacts
    fn name(&self) -> &str;

    /// Minimum number of samples a fit requires
    fn min_samples(&self) -> usize;

    /// Fit a model on an ordered series
    fn fit(
        &self,
        metric: Metric,
        series: &[SeriesPoint],
    ) -> Result<Box<dyn FittedModel>, ModelFitError>;
}

/// A trained model that can be evaluated at arbitrary future instants
pub trait FittedModel: Send + Sync + Debug {
    /// Point prediction at `at`
    fn predict(&self, at: DateTime<Utc>) -> f64;

    /// Serialize the trained parameters to a JSON document
    fn to_json(&self) -> Result<String, serde_json::Error>;
}
