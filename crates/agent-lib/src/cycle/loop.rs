//! Agent polling loop
//!
//! Polls the sensor feed at a fixed interval, feeds each accepted sample to
//! the orchestrator, and publishes and persists the results of every cycle.

use super::orchestrator::{CycleOrchestrator, CycleOutcome};
use crate::health::{components, HealthRegistry};
use crate::models::Metric;
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::sync::{check_fresh, ModelStore, Publication, ResultSink, SensorFeed};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between feed polls (default: 10 seconds)
    pub poll_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fetch failed or the sample was rejected
    NoSample,
    /// Sample appended, no cycle ran
    Buffered,
    /// Sample appended and the given cycle ran
    CycleCompleted(u64),
}

/// Main agent loop
pub struct AgentLoop {
    feed: Arc<dyn SensorFeed>,
    sink: Arc<dyn ResultSink>,
    store: Option<(Arc<dyn ModelStore>, Metric)>,
    orchestrator: CycleOrchestrator,
    config: LoopConfig,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl AgentLoop {
    pub fn orchestrator(&self) -> &CycleOrchestrator {
        &self.orchestrator
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            capacity = self.orchestrator.buffer().capacity(),
            "Starting forecast loop"
        );

        loop {
            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down forecast loop");
                    break;
                }
            }
        }
    }

    /// Fetch one sample and run a cycle if it makes one due
    pub async fn poll_once(&mut self) -> PollOutcome {
        let newest = self.orchestrator.buffer().newest().copied();
        let fetched = self
            .feed
            .fetch()
            .await
            .and_then(|sample| check_fresh(&sample, newest.as_ref()).map(|_| sample));

        let sample = match fetched {
            Ok(sample) => sample,
            Err(e) => {
                self.metrics.inc_fetch_errors();
                self.logger
                    .log_fetch_failure(&e.to_string(), self.orchestrator.buffer().len());
                self.health
                    .set_degraded(components::FEED, e.to_string())
                    .await;
                return PollOutcome::NoSample;
            }
        };

        self.health.set_healthy(components::FEED).await;
        self.metrics.inc_samples_ingested();

        let timestamp = sample.timestamp.to_rfc3339();
        let outcome = self.orchestrator.ingest(sample).await;
        let buffer = self.orchestrator.buffer();
        self.metrics.set_buffer_samples(buffer.len());
        self.logger
            .log_sample(&timestamp, buffer.len(), buffer.capacity());

        match outcome {
            None => PollOutcome::Buffered,
            Some(outcome) => {
                self.record(&outcome).await;
                self.publish(&outcome).await;
                self.persist(&outcome).await;
                PollOutcome::CycleCompleted(outcome.cycle)
            }
        }
    }

    async fn record(&self, outcome: &CycleOutcome) {
        self.metrics.inc_cycles();
        self.metrics
            .observe_cycle_latency(outcome.duration.as_secs_f64());
        for duration in outcome.fit_durations.values() {
            self.metrics.observe_fit_latency(duration.as_secs_f64());
        }
        for (metric, bias) in outcome.bias.iter() {
            self.metrics.set_bias(metric, bias);
        }
        for (metric, evaluation) in &outcome.evaluations {
            self.metrics.set_accuracy(*metric, &evaluation.report);
            self.logger.log_accuracy(
                *metric,
                &evaluation.report,
                evaluation.previous_bias,
                evaluation.bias,
            );
        }
        for failure in &outcome.failures {
            self.metrics.inc_model_fit_errors();
            self.logger
                .log_fit_failure(failure.metric(), &failure.to_string());
        }

        self.logger.log_cycle(
            outcome.cycle,
            outcome.refreshed.len(),
            outcome.failures.len(),
            outcome.duration.as_millis() as u64,
        );

        if outcome.refreshed.is_empty() {
            self.health
                .set_unhealthy(components::FORECASTER, "no metric produced a forecast")
                .await;
        } else if !outcome.failures.is_empty() {
            let failed: Vec<&str> = outcome
                .failures
                .iter()
                .map(|f| f.metric().as_str())
                .collect();
            self.health
                .set_degraded(
                    components::FORECASTER,
                    format!("fit failed for {}", failed.join(", ")),
                )
                .await;
        } else {
            self.health.set_healthy(components::FORECASTER).await;
        }
        self.health.record_cycle(outcome.cycle).await;
    }

    async fn publish(&self, outcome: &CycleOutcome) {
        let publication = Publication {
            forecast: outcome.forecast_payload(),
            accuracy: outcome.accuracy_payload(),
            advice: outcome.advice.clone(),
        };

        match self.sink.publish(&publication).await {
            Ok(()) => {
                self.logger.log_publish(outcome.cycle, true, None);
                self.health.set_healthy(components::SINK).await;
            }
            Err(e) => {
                self.metrics.inc_publish_errors();
                self.logger
                    .log_publish(outcome.cycle, false, Some(&e.to_string()));
                self.health.set_degraded(components::SINK, e.to_string()).await;
            }
        }
    }

    async fn persist(&self, outcome: &CycleOutcome) {
        let Some((store, metric)) = &self.store else {
            return;
        };
        let Some(model) = outcome.models.get(metric) else {
            debug!(metric = %metric, "No fresh model to persist this cycle");
            return;
        };

        match store.save(*metric, model.as_ref()) {
            Ok(stored) => {
                self.logger.log_model_saved(
                    *metric,
                    &stored.path.display().to_string(),
                    &stored.checksum,
                    stored.bytes,
                );
                self.health.set_healthy(components::MODEL_STORE).await;
            }
            Err(e) => {
                self.metrics.inc_persistence_errors();
                warn!(metric = %metric, error = %e, "Failed to persist model");
                self.health
                    .set_degraded(components::MODEL_STORE, e.to_string())
                    .await;
            }
        }
    }
}

/// Builder for the agent loop
pub struct AgentLoopBuilder {
    feed: Option<Arc<dyn SensorFeed>>,
    sink: Option<Arc<dyn ResultSink>>,
    store: Option<(Arc<dyn ModelStore>, Metric)>,
    orchestrator: Option<CycleOrchestrator>,
    config: LoopConfig,
    metrics: Option<AgentMetrics>,
    logger: Option<StructuredLogger>,
    health: Option<HealthRegistry>,
}

impl AgentLoopBuilder {
    pub fn new() -> Self {
        Self {
            feed: None,
            sink: None,
            store: None,
            orchestrator: None,
            config: LoopConfig::default(),
            metrics: None,
            logger: None,
            health: None,
        }
    }

    pub fn feed(mut self, feed: Arc<dyn SensorFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Persist the model fitted for `metric` after every cycle
    pub fn store(mut self, store: Arc<dyn ModelStore>, metric: Metric) -> Self {
        self.store = Some((store, metric));
        self
    }

    pub fn orchestrator(mut self, orchestrator: CycleOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn build(self) -> Result<AgentLoop> {
        let feed = self
            .feed
            .ok_or_else(|| anyhow::anyhow!("Sensor feed is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Result sink is required"))?;
        let orchestrator = self
            .orchestrator
            .ok_or_else(|| anyhow::anyhow!("Orchestrator is required"))?;

        Ok(AgentLoop {
            feed,
            sink,
            store: self.store,
            orchestrator,
            config: self.config,
            metrics: self.metrics.unwrap_or_default(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            health: self.health.unwrap_or_default(),
        })
    }
}

impl Default for AgentLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
