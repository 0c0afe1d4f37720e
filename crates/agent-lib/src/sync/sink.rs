//! Result sink client
//!
//! Publishes each cycle's forecast, accuracy and advice as three
//! independent PUTs against sibling resources of one base location.

use crate::error::{PublishError, PublishFailure};
use crate::models::{AccuracyPayload, ForecastPayload};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const FORECAST_RESOURCE: &str = "ForecastData.json";
pub const ACCURACY_RESOURCE: &str = "ForecastAccuracy.json";
pub const ADVICE_RESOURCE: &str = "ForecastAdvice.json";

/// Everything published after one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Publication {
    pub forecast: ForecastPayload,
    pub accuracy: AccuracyPayload,
    pub advice: Vec<String>,
}

/// Destination for cycle results
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Write all three resources. Succeeds only if every write succeeds.
    async fn publish(&self, publication: &Publication) -> Result<(), PublishError>;
}

/// HTTP result sink
pub struct HttpResultSink {
    client: Client,
    base_url: Url,
}

impl HttpResultSink {
    /// Create a sink rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = as_directory(Url::parse(base_url).context("Invalid sink URL")?);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn put<B: Serialize + ?Sized>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<(), PublishFailure> {
        let failure = |status: Option<u16>, message: String| PublishFailure {
            resource: resource.to_string(),
            status,
            message,
        };

        let url = self
            .base_url
            .join(resource)
            .map_err(|e| failure(None, e.to_string()))?;

        let response = self
            .client
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| failure(None, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(failure(Some(status.as_u16()), body));
        }

        debug!(resource = %resource, "Resource written");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    async fn publish(&self, publication: &Publication) -> Result<(), PublishError> {
        let (forecast, accuracy, advice) = tokio::join!(
            self.put(FORECAST_RESOURCE, &publication.forecast),
            self.put(ACCURACY_RESOURCE, &publication.accuracy),
            self.put(ADVICE_RESOURCE, &publication.advice),
        );

        let failures: Vec<PublishFailure> = [forecast, accuracy, advice]
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { failures })
        }
    }
}

/// Sink base derived from the feed URL: the feed's last path segment removed
pub fn sink_base_from_feed(feed_url: &str) -> Result<Url> {
    let feed = Url::parse(feed_url).context("Invalid feed URL")?;
    let mut base = feed.join(".").context("Feed URL has no parent")?;
    base.set_query(None);
    Ok(base)
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_base_from_feed() {
        let base = sink_base_from_feed("https://example.test/SensorData.json").unwrap();
        assert_eq!(base.as_str(), "https://example.test/");

        let base = sink_base_from_feed("http://localhost:9000/site/a/SensorData.json").unwrap();
        assert_eq!(base.as_str(), "http://localhost:9000/site/a/");
        assert_eq!(
            base.join(FORECAST_RESOURCE).unwrap().as_str(),
            "http://localhost:9000/site/a/ForecastData.json"
        );

        assert!(sink_base_from_feed("not a url").is_err());
    }

    #[test]
    fn test_sink_base_gets_trailing_slash() {
        let sink = HttpResultSink::new("http://localhost:9000/site", Duration::from_secs(1)).unwrap();
        assert_eq!(sink.base_url().as_str(), "http://localhost:9000/site/");
    }

    #[test]
    fn test_publication_serializes_keyed_payloads() {
        let publication = Publication {
            advice: vec!["Air quality is excellent.".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_value(&publication).unwrap();
        assert_eq!(json["advice"][0], "Air quality is excellent.");
        assert!(json["forecast"].as_object().unwrap().is_empty());
    }
}
