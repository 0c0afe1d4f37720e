//! Agent library for streaming environmental forecasting
//!
//! This crate provides the core functionality for:
//! - Windowed buffering of temperature, humidity and CO2 samples
//! - Short-horizon forecasting with pluggable model backends
//! - Accuracy evaluation and residual bias correction
//! - Threshold advisories, result publication and model persistence
//! - Health checks and observability

pub mod advisory;
pub mod buffer;
pub mod cycle;
pub mod error;
pub mod evaluation;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod sync;

pub use error::{FetchError, ModelFitError, PersistenceError, PublishError, PublishFailure};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, LastCycle, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
