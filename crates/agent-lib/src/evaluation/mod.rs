//! Forecast evaluation and self-correction
//!
//! This module provides:
//! - Nearest-neighbour alignment of forecasts against realized samples
//! - MAE, MSE, RMSE and MAPE over the aligned pairs
//! - Residual bias carried into the next forecast

mod accuracy;
mod bias;

pub use accuracy::{AccuracyEvaluator, Evaluation, DEFAULT_TOLERANCE};
pub use bias::BiasCorrector;
