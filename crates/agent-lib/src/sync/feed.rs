//! Sensor feed client
//!
//! Fetches the latest reading document from the feed and decodes it into a
//! [`Sample`]. The feed returns one JSON object per request:
//!
//! ```json
//! {"timestamp": "2024-05-01 10:00:00", "temperature": 24.1, "humidity": 51, "carbon": "412"}
//! ```

use crate::error::FetchError;
use crate::models::{Metric, Sample};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Naive layouts accepted for feed timestamps, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Source of sensor samples
#[async_trait]
pub trait SensorFeed: Send + Sync {
    /// Fetch the most recent sample
    async fn fetch(&self) -> Result<Sample, FetchError>;
}

/// HTTP sensor feed
pub struct HttpSensorFeed {
    client: Client,
    url: Url,
}

impl HttpSensorFeed {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let url = Url::parse(url).context("Invalid feed URL")?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SensorFeed for HttpSensorFeed {
    async fn fetch(&self) -> Result<Sample, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;

        if response.status() != StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = response.text().await?;
        let document: Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::Schema(format!("body is not JSON: {}", e)))?;
        let sample = parse_sample(&document)?;
        debug!(timestamp = %sample.timestamp, "Fetched sensor sample");
        Ok(sample)
    }
}

/// Decode one feed document
pub fn parse_sample(document: &Value) -> Result<Sample, FetchError> {
    let object = document
        .as_object()
        .ok_or_else(|| FetchError::Schema("expected a JSON object".to_string()))?;

    let timestamp = object
        .get("timestamp")
        .ok_or_else(|| FetchError::Schema("missing field `timestamp`".to_string()))
        .and_then(parse_timestamp)?;

    let field = |metric: Metric| -> Result<f64, FetchError> {
        let value = object
            .get(metric.as_str())
            .ok_or_else(|| FetchError::Schema(format!("missing field `{}`", metric)))?;
        coerce_number(value)
            .ok_or_else(|| FetchError::Schema(format!("field `{}` is not numeric: {}", metric, value)))
    };

    Ok(Sample {
        timestamp,
        temperature: field(Metric::Temperature)?,
        humidity: field(Metric::Humidity)?,
        carbon: field(Metric::Carbon)?,
    })
}

/// Accepts RFC 3339, naive date-times (UTC) and epoch seconds or milliseconds
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, FetchError> {
    let parsed = match value {
        Value::String(text) => parse_timestamp_str(text.trim()),
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    };
    parsed.ok_or_else(|| FetchError::Schema(format!("unparseable timestamp: {}", value)))
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    text.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value > EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Reject a sample older than the newest one already buffered
pub fn check_fresh(sample: &Sample, newest: Option<&Sample>) -> Result<(), FetchError> {
    match newest {
        Some(newest) if sample.timestamp < newest.timestamp => Err(FetchError::Stale {
            sample: sample.timestamp.to_rfc3339(),
            newest: newest.timestamp.to_rfc3339(),
        }),
        _ => Ok(()),
    }
}
