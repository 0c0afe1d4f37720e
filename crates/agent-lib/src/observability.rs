//! Observability infrastructure for the forecasting agent
//!
//! Provides:
//! - Prometheus metrics (ingest, cycle and fit latency, bias, accuracy)
//! - Structured JSON logging with tracing

use crate::models::{AccuracyReport, Metric};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for cycle and fit latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    samples_ingested: IntCounter,
    fetch_errors: IntCounter,
    cycles_completed: IntCounter,
    model_fit_errors: IntCounter,
    publish_errors: IntCounter,
    persistence_errors: IntCounter,
    cycle_latency_seconds: Histogram,
    fit_latency_seconds: Histogram,
    buffer_samples: IntGauge,
    bias: GaugeVec,
    accuracy: GaugeVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            samples_ingested: register_int_counter!(
                "envcast_samples_ingested_total",
                "Total number of sensor samples appended to the window"
            )
            .expect("Failed to register samples_ingested"),

            fetch_errors: register_int_counter!(
                "envcast_fetch_errors_total",
                "Total number of failed or rejected sensor fetches"
            )
            .expect("Failed to register fetch_errors"),

            cycles_completed: register_int_counter!(
                "envcast_cycles_total",
                "Total number of completed forecast cycles"
            )
            .expect("Failed to register cycles_completed"),

            model_fit_errors: register_int_counter!(
                "envcast_model_fit_errors_total",
                "Total number of per-metric model fit failures"
            )
            .expect("Failed to register model_fit_errors"),

            publish_errors: register_int_counter!(
                "envcast_publish_errors_total",
                "Total number of failed result publications"
            )
            .expect("Failed to register publish_errors"),

            persistence_errors: register_int_counter!(
                "envcast_persistence_errors_total",
                "Total number of failed model persistence attempts"
            )
            .expect("Failed to register persistence_errors"),

            cycle_latency_seconds: register_histogram!(
                "envcast_cycle_latency_seconds",
                "Wall time of a full forecast cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            fit_latency_seconds: register_histogram!(
                "envcast_fit_latency_seconds",
                "Time spent fitting and predicting one metric",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fit_latency_seconds"),

            buffer_samples: register_int_gauge!(
                "envcast_buffer_samples",
                "Number of samples currently held in the window"
            )
            .expect("Failed to register buffer_samples"),

            bias: register_gauge_vec!(
                "envcast_bias",
                "Residual bias applied to the latest forecast",
                &["metric"]
            )
            .expect("Failed to register bias"),

            accuracy: register_gauge_vec!(
                "envcast_accuracy",
                "Accuracy of the previous forecast against realized samples",
                &["metric", "stat"]
            )
            .expect("Failed to register accuracy"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn inc_samples_ingested(&self) {
        self.inner().samples_ingested.inc();
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    pub fn inc_cycles(&self) {
        self.inner().cycles_completed.inc();
    }

    pub fn inc_model_fit_errors(&self) {
        self.inner().model_fit_errors.inc();
    }

    pub fn inc_publish_errors(&self) {
        self.inner().publish_errors.inc();
    }

    pub fn inc_persistence_errors(&self) {
        self.inner().persistence_errors.inc();
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn observe_fit_latency(&self, duration_secs: f64) {
        self.inner().fit_latency_seconds.observe(duration_secs);
    }

    pub fn set_buffer_samples(&self, samples: usize) {
        self.inner().buffer_samples.set(samples as i64);
    }

    pub fn set_bias(&self, metric: Metric, bias: f64) {
        self.inner()
            .bias
            .with_label_values(&[metric.as_str()])
            .set(bias);
    }

    /// Export every populated statistic of a report
    pub fn set_accuracy(&self, metric: Metric, report: &AccuracyReport) {
        let stats = [
            ("mae", report.mae),
            ("mse", report.mse),
            ("rmse", report.rmse),
            ("mape", report.mape),
        ];
        for (stat, value) in stats {
            let gauge = self
                .inner()
                .accuracy
                .with_label_values(&[metric.as_str(), stat]);
            match value {
                Some(v) => gauge.set(v),
                None => gauge.set(f64::NAN),
            }
        }
    }

    /// Read back the samples counter; used by tests
    pub fn samples_ingested(&self) -> u64 {
        self.inner().samples_ingested.get()
    }

    /// Read back the cycles counter; used by tests
    pub fn cycles(&self) -> u64 {
        self.inner().cycles_completed.get()
    }
}

/// Structured logger for agent events
///
/// Provides consistent JSON-formatted logging for cycles, publications
/// and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    agent_name: String,
}

impl StructuredLogger {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Log an accepted sample
    pub fn log_sample(&self, timestamp: &str, buffered: usize, capacity: usize) {
        debug!(
            event = "sample_ingested",
            agent = %self.agent_name,
            timestamp = %timestamp,
            buffered = buffered,
            capacity = capacity,
            "Sensor sample appended"
        );
    }

    /// Log a rejected or failed sample fetch
    pub fn log_fetch_failure(&self, error: &str, buffered: usize) {
        warn!(
            event = "fetch_failed",
            agent = %self.agent_name,
            error = %error,
            buffered = buffered,
            "Sensor fetch failed, waiting for next poll"
        );
    }

    /// Log a completed forecast cycle
    pub fn log_cycle(&self, cycle: u64, refreshed: usize, failed: usize, duration_ms: u64) {
        info!(
            event = "cycle_completed",
            agent = %self.agent_name,
            cycle = cycle,
            refreshed = refreshed,
            failed = failed,
            duration_ms = duration_ms,
            "Forecast cycle completed"
        );
    }

    /// Log a per-metric accuracy evaluation
    pub fn log_accuracy(
        &self,
        metric: Metric,
        report: &AccuracyReport,
        previous_bias: f64,
        bias: f64,
    ) {
        info!(
            event = "forecast_evaluated",
            agent = %self.agent_name,
            metric = %metric,
            mae = ?report.mae,
            rmse = ?report.rmse,
            mape = ?report.mape,
            previous_bias = previous_bias,
            bias = bias,
            "Previous forecast evaluated"
        );
    }

    /// Log a per-metric model fit failure
    pub fn log_fit_failure(&self, metric: Metric, error: &str) {
        warn!(
            event = "model_fit_failed",
            agent = %self.agent_name,
            metric = %metric,
            error = %error,
            "Model fit failed, keeping previous forecast"
        );
    }

    /// Log a publication attempt
    pub fn log_publish(&self, cycle: u64, success: bool, error: Option<&str>) {
        if success {
            info!(
                event = "results_published",
                agent = %self.agent_name,
                cycle = cycle,
                "Published forecast, accuracy and advice"
            );
        } else {
            warn!(
                event = "publish_failed",
                agent = %self.agent_name,
                cycle = cycle,
                error = error.unwrap_or("unknown"),
                "Publication failed, results will be sent with the next cycle"
            );
        }
    }

    /// Log a persisted model artifact
    pub fn log_model_saved(&self, metric: Metric, path: &str, checksum: &str, bytes: usize) {
        info!(
            event = "model_saved",
            agent = %self.agent_name,
            metric = %metric,
            path = %path,
            checksum = %checksum,
            bytes = bytes,
            "Fitted model persisted"
        );
    }

    pub fn log_startup(&self, version: &str, backend: &str) {
        info!(
            event = "agent_started",
            agent = %self.agent_name,
            agent_version = %version,
            backend = %backend,
            "Forecasting agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            agent = %self.agent_name,
            reason = %reason,
            "Forecasting agent shutting down"
        );
    }
}
