//! Integration tests for the sync module
//!
//! These tests verify:
//! - Feed fetch against a live HTTP mock
//! - Three-resource publication and partial failure reporting
//! - Atomic model persistence

use super::*;
use crate::error::FetchError;
use crate::forecast::{LinearTrendModel, ModelBackend};
use crate::models::{AccuracyReport, Metric, PublishedPoint, SeriesPoint};
use chrono::{TimeZone, Utc};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

mod feed_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_decodes_sample() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/SensorData.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "timestamp": "2024-05-01 10:00:00",
                    "temperature": "24.5",
                    "humidity": 51,
                    "carbon": 412.0
                })
                .to_string(),
            )
            .create_async()
            .await;

        let feed = HttpSensorFeed::new(&format!("{}/SensorData.json", server.url()), TIMEOUT).unwrap();
        let sample = feed.fetch().await.unwrap();

        assert_eq!(sample.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(sample.temperature, 24.5);
        assert_eq!(sample.carbon, 412.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SensorData.json")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let feed = HttpSensorFeed::new(&format!("{}/SensorData.json", server.url()), TIMEOUT).unwrap();
        match feed.fetch().await {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_null_document_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SensorData.json")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let feed = HttpSensorFeed::new(&format!("{}/SensorData.json", server.url()), TIMEOUT).unwrap();
        assert!(matches!(feed.fetch().await, Err(FetchError::Schema(_))));
    }

    #[tokio::test]
    async fn test_fetch_non_ok_success_status_is_no_sample() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SensorData.json")
            .with_status(204)
            .create_async()
            .await;

        let feed = HttpSensorFeed::new(&format!("{}/SensorData.json", server.url()), TIMEOUT).unwrap();
        assert!(matches!(
            feed.fetch().await,
            Err(FetchError::Status { status: 204, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_schema_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/SensorData.json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let feed = HttpSensorFeed::new(&format!("{}/SensorData.json", server.url()), TIMEOUT).unwrap();
        assert!(matches!(feed.fetch().await, Err(FetchError::Schema(_))));
    }

    #[test]
    fn test_invalid_feed_url() {
        assert!(HttpSensorFeed::new("::not a url::", TIMEOUT).is_err());
    }
}

mod sink_tests {
    use super::*;

    fn publication() -> Publication {
        let mut publication = Publication::default();
        publication.forecast.insert(
            Metric::Temperature.to_string(),
            vec![PublishedPoint {
                timestamp: "2024-05-01 10:05:00".to_string(),
                value: 24.0,
            }],
        );
        publication.accuracy.insert(
            Metric::Temperature.to_string(),
            AccuracyReport {
                mae: Some(0.5),
                mse: Some(0.25),
                rmse: Some(0.5),
                mape: Some(2.0),
            },
        );
        publication.advice = vec!["Temperature levels are comfortable.".to_string()];
        publication
    }

    #[tokio::test]
    async fn test_publish_writes_three_resources() {
        let mut server = mockito::Server::new_async().await;
        let forecast = server
            .mock("PUT", "/ForecastData.json")
            .match_body(Matcher::PartialJson(json!({
                "temperature": [{"timestamp": "2024-05-01 10:05:00", "value": 24.0}]
            })))
            .with_status(200)
            .create_async()
            .await;
        let accuracy = server
            .mock("PUT", "/ForecastAccuracy.json")
            .match_body(Matcher::PartialJson(json!({
                "temperature": {"MAE": 0.5, "RMSE": 0.5, "MAPE": 2.0}
            })))
            .with_status(200)
            .create_async()
            .await;
        let advice = server
            .mock("PUT", "/ForecastAdvice.json")
            .match_body(Matcher::Json(json!(["Temperature levels are comfortable."])))
            .with_status(200)
            .create_async()
            .await;

        let sink = HttpResultSink::new(&server.url(), TIMEOUT).unwrap();
        sink.publish(&publication()).await.unwrap();

        forecast.assert_async().await;
        accuracy.assert_async().await;
        advice.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_reports_each_failed_resource() {
        let mut server = mockito::Server::new_async().await;
        let _forecast = server
            .mock("PUT", "/ForecastData.json")
            .with_status(200)
            .create_async()
            .await;
        let _accuracy = server
            .mock("PUT", "/ForecastAccuracy.json")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let advice = server
            .mock("PUT", "/ForecastAdvice.json")
            .with_status(200)
            .create_async()
            .await;

        let sink = HttpResultSink::new(&server.url(), TIMEOUT).unwrap();
        let err = sink.publish(&publication()).await.unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].resource, ACCURACY_RESOURCE);
        assert_eq!(err.failures[0].status, Some(500));
        assert_eq!(err.failures[0].message, "boom");

        // The other writes were still attempted
        advice.assert_async().await;
    }

    #[tokio::test]
    async fn test_sink_base_derived_from_feed_url() {
        let mut server = mockito::Server::new_async().await;
        let mocks = [
            server.mock("PUT", "/site/ForecastData.json").create_async().await,
            server.mock("PUT", "/site/ForecastAccuracy.json").create_async().await,
            server.mock("PUT", "/site/ForecastAdvice.json").create_async().await,
        ];

        let base = sink_base_from_feed(&format!("{}/site/SensorData.json", server.url())).unwrap();
        let sink = HttpResultSink::new(base.as_str(), TIMEOUT).unwrap();
        sink.publish(&Publication::default()).await.unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
    }
}

mod store_tests {
    use super::*;

    fn fitted() -> Box<dyn crate::forecast::FittedModel> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let series: Vec<SeriesPoint> = (0..10)
            .map(|i| SeriesPoint::new(t0 + chrono::Duration::seconds(10 * i), 400.0 + i as f64))
            .collect();
        LinearTrendModel::new().fit(Metric::Carbon, &series).unwrap()
    }

    #[test]
    fn test_save_writes_artifact_and_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("carbon_model.json");
        let store = FileModelStore::new(&path);

        let model = fitted();
        let stored = store.save(Metric::Carbon, model.as_ref()).unwrap();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(stored.path, path);
        assert_eq!(stored.bytes, contents.len());
        assert_eq!(stored.checksum, compute_checksum(&contents));
        assert!(!path.with_extension("tmp").exists());

        let json: serde_json::Value = serde_json::from_slice(&contents).unwrap();
        assert_eq!(json["metric"], "carbon");
        assert_eq!(json["backend"], "linear_trend");
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("carbon_model.json");
        std::fs::write(&path, "stale").unwrap();

        let store = FileModelStore::new(&path);
        store.save(Metric::Carbon, fitted().as_ref()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("slope_per_second"));
    }

    #[test]
    fn test_save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let store = FileModelStore::new(blocker.join("carbon_model.json"));
        let err = store.save(Metric::Carbon, fitted().as_ref()).unwrap_err();
        assert!(matches!(err, crate::error::PersistenceError::Io { .. }));
    }
}
