//! I/O boundary of the agent
//!
//! This module provides:
//! - HTTP sensor feed client with lenient payload decoding
//! - HTTP result sink publishing forecast, accuracy and advice
//! - Atomic on-disk persistence of fitted models

mod feed;
mod sink;
mod store;

#[cfg(test)]
mod tests;

pub use feed::{check_fresh, parse_sample, parse_timestamp, HttpSensorFeed, SensorFeed};
pub use sink::{
    sink_base_from_feed, HttpResultSink, Publication, ResultSink, ACCURACY_RESOURCE,
    ADVICE_RESOURCE, FORECAST_RESOURCE,
};
pub use store::{compute_checksum, FileModelStore, ModelStore, StoredModel};
