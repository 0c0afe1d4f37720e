//! Error types for the telemetry agent
//!
//! Each external collaborator has its own error type so the runtime loop
//! can decide per failure whether to skip a sample, a metric, or nothing.

use crate::models::Metric;
use thiserror::Error;

/// Failure to obtain a usable sample from the sensor feed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("feed payload rejected: {0}")]
    Schema(String),

    #[error("stale sample at {sample}, newest buffered sample is {newest}")]
    Stale { sample: String, newest: String },
}

/// Failure to fit or run the forecasting model for one metric
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFitError {
    #[error("{metric}: insufficient data ({samples} samples, need {required})")]
    InsufficientData {
        metric: Metric,
        samples: usize,
        required: usize,
    },

    #[error("{metric}: degenerate series: {reason}")]
    Degenerate { metric: Metric, reason: String },

    #[error("{metric}: model fit exceeded {timeout_ms}ms")]
    Timeout { metric: Metric, timeout_ms: u64 },

    #[error("{metric}: model fit aborted: {reason}")]
    Aborted { metric: Metric, reason: String },
}

impl ModelFitError {
    pub fn metric(&self) -> Metric {
        match self {
            ModelFitError::InsufficientData { metric, .. }
            | ModelFitError::Degenerate { metric, .. }
            | ModelFitError::Timeout { metric, .. }
            | ModelFitError::Aborted { metric, .. } => *metric,
        }
    }
}

/// Failure of one or more result sink writes
#[derive(Debug, Error)]
#[error("publish failed for {}", describe(.failures))]
pub struct PublishError {
    pub failures: Vec<PublishFailure>,
}

/// A single failed sink write
#[derive(Debug, Clone, PartialEq)]
pub struct PublishFailure {
    pub resource: String,
    /// HTTP status, absent when the request never got a response
    pub status: Option<u16>,
    pub message: String,
}

fn describe(failures: &[PublishFailure]) -> String {
    failures
        .iter()
        .map(|f| match f.status {
            Some(status) => format!("{} (status {})", f.resource, status),
            None => format!("{} ({})", f.resource, f.message),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure to write a model artifact
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize model: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write model to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
