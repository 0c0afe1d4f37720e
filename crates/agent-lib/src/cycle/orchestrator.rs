//! Forecast cycle orchestration
//!
//! Owns the sample window and all cross-cycle state. Each triggered cycle
//! evaluates the previous forecast, refreshes the residual bias, and
//! produces a new bias-corrected forecast for every metric. Cycle state is
//! committed in one step at the end of the cycle.

use super::scheduler::{CycleScheduler, SchedulerState};
use crate::advisory::{Advisor, AdvisoryInput, ThresholdAdvisor};
use crate::buffer::SampleBuffer;
use crate::error::ModelFitError;
use crate::evaluation::{AccuracyEvaluator, BiasCorrector};
use crate::forecast::{FittedModel, ForecastEngine, DEFAULT_HORIZON};
use crate::models::{
    AccuracyPayload, AccuracyReport, BiasState, ForecastPayload, ForecastPoint, Metric,
    PublishedPoint, Sample, SeriesPoint,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cross-cycle state
#[derive(Debug, Clone, Default)]
pub struct CycleState {
    /// Most recent forecast per metric; a failed metric keeps its previous entry
    pub last_forecast: BTreeMap<Metric, Vec<ForecastPoint>>,
    pub bias: BiasState,
    /// Latest accuracy report per evaluated metric
    pub accuracy: BTreeMap<Metric, AccuracyReport>,
    /// Completion time of the last cycle
    pub last_cycle_time: Option<Instant>,
    pub cycles: u64,
}

/// Evaluation of one metric's previous forecast
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvaluation {
    pub report: AccuracyReport,
    pub mean_residual: Option<f64>,
    pub aligned: usize,
    pub previous_bias: f64,
    pub bias: f64,
}

/// Everything a completed cycle hands to the publishing side
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub cycle: u64,
    /// Current forecast per metric, including entries retained from earlier cycles
    pub forecasts: BTreeMap<Metric, Vec<ForecastPoint>>,
    /// Metrics whose forecast was produced by this cycle
    pub refreshed: Vec<Metric>,
    pub accuracy: BTreeMap<Metric, AccuracyReport>,
    pub evaluations: BTreeMap<Metric, MetricEvaluation>,
    pub bias: BiasState,
    pub advice: Vec<String>,
    pub failures: Vec<ModelFitError>,
    pub models: BTreeMap<Metric, Arc<dyn FittedModel>>,
    pub fit_durations: BTreeMap<Metric, Duration>,
    pub duration: Duration,
}

impl CycleOutcome {
    /// Corrected series keyed by metric name
    pub fn forecast_payload(&self) -> ForecastPayload {
        self.forecasts
            .iter()
            .map(|(metric, points)| {
                (
                    metric.to_string(),
                    points.iter().map(PublishedPoint::from).collect(),
                )
            })
            .collect()
    }

    /// Accuracy reports keyed by metric name
    pub fn accuracy_payload(&self) -> AccuracyPayload {
        self.accuracy
            .iter()
            .map(|(metric, report)| (metric.to_string(), *report))
            .collect()
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub capacity: usize,
    pub horizon: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            capacity: crate::buffer::DEFAULT_CAPACITY,
            horizon: DEFAULT_HORIZON,
        }
    }
}

/// Sequences evaluation, bias update and forecasting across cycles
pub struct CycleOrchestrator {
    buffer: SampleBuffer,
    state: CycleState,
    scheduler: CycleScheduler,
    engine: ForecastEngine,
    evaluator: AccuracyEvaluator,
    advisor: Arc<dyn Advisor>,
    horizon: usize,
}

impl CycleOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        scheduler: CycleScheduler,
        engine: ForecastEngine,
        evaluator: AccuracyEvaluator,
    ) -> Self {
        Self {
            buffer: SampleBuffer::new(config.capacity),
            state: CycleState::default(),
            scheduler,
            engine,
            evaluator,
            advisor: Arc::new(ThresholdAdvisor::default()),
            horizon: config.horizon,
        }
    }

    /// Replace the default threshold advisor
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn bias(&self, metric: Metric) -> f64 {
        self.state.bias.get(metric)
    }

    pub fn last_forecast(&self, metric: Metric) -> Option<&[ForecastPoint]> {
        self.state.last_forecast.get(&metric).map(Vec::as_slice)
    }

    pub fn last_cycle_time(&self) -> Option<Instant> {
        self.state.last_cycle_time
    }

    pub fn scheduler(&self) -> &CycleScheduler {
        &self.scheduler
    }

    /// Append a sample and run a cycle if one is due
    pub async fn ingest(&mut self, sample: Sample) -> Option<CycleOutcome> {
        self.ingest_at(sample, Instant::now()).await
    }

    /// Append a sample observed at `now` and run a cycle if one is due
    pub async fn ingest_at(&mut self, sample: Sample, now: Instant) -> Option<CycleOutcome> {
        self.buffer.append(sample);

        match self
            .scheduler
            .on_append(self.buffer.is_full(), self.state.last_cycle_time, now)
        {
            SchedulerState::Idle => None,
            SchedulerState::Ready => Some(self.run_cycle(now).await),
        }
    }

    /// Run one evaluation and forecast pass over every metric
    async fn run_cycle(&mut self, now: Instant) -> CycleOutcome {
        let started = Instant::now();
        let mut next = self.state.clone();
        next.cycles += 1;

        info!(
            cycle = next.cycles,
            samples = self.buffer.len(),
            "Starting forecast cycle"
        );

        let evaluations = self.evaluate_previous(&mut next);

        let mut refreshed = Vec::new();
        let mut failures = Vec::new();
        let mut models = BTreeMap::new();
        let mut fit_durations = BTreeMap::new();

        for metric in Metric::ALL {
            let series = self.buffer.series(metric);
            match self.engine.forecast(metric, series, self.horizon).await {
                Ok(raw) => {
                    let bias = next.bias.get(metric);
                    let corrected = BiasCorrector::apply_correction(&raw.points, bias);
                    let points = merge(&raw.points, &corrected);

                    debug!(
                        metric = %metric,
                        bias = bias,
                        first_corrected = ?points.first().map(|p| p.corrected_value),
                        "Forecast corrected"
                    );

                    next.last_forecast.insert(metric, points);
                    models.insert(metric, raw.model);
                    fit_durations.insert(metric, raw.fit_duration);
                    refreshed.push(metric);
                }
                Err(e) => {
                    warn!(metric = %metric, error = %e, "Forecast skipped for metric");
                    failures.push(e);
                }
            }
        }

        let advice = self.advisor.advise(&advisory_input(&next.last_forecast));

        let duration = started.elapsed();
        next.last_cycle_time = Some(now + duration);
        self.state = next;

        info!(
            cycle = self.state.cycles,
            refreshed = refreshed.len(),
            failed = failures.len(),
            duration_ms = duration.as_millis() as u64,
            "Forecast cycle complete"
        );

        CycleOutcome {
            cycle: self.state.cycles,
            forecasts: self.state.last_forecast.clone(),
            refreshed,
            accuracy: self.state.accuracy.clone(),
            evaluations,
            bias: self.state.bias.clone(),
            advice,
            failures,
            models,
            fit_durations,
            duration,
        }
    }

    /// Score each metric's previous raw forecast against the current window
    /// and replace its bias with the fresh mean residual
    fn evaluate_previous(&self, next: &mut CycleState) -> BTreeMap<Metric, MetricEvaluation> {
        let mut evaluations = BTreeMap::new();

        for metric in Metric::ALL {
            let Some(prior) = self.state.last_forecast.get(&metric) else {
                continue;
            };

            let forecast: Vec<SeriesPoint> = prior.iter().map(ForecastPoint::raw).collect();
            let actual = self.buffer.series(metric);
            let evaluation = self.evaluator.evaluate(&forecast, &actual);

            let previous_bias = next.bias.get(metric);
            let bias = BiasCorrector::update_bias(previous_bias, evaluation.mean_residual);
            next.bias.set(metric, bias);
            next.accuracy.insert(metric, evaluation.report);

            debug!(
                metric = %metric,
                aligned = evaluation.aligned,
                mean_residual = ?evaluation.mean_residual,
                bias = bias,
                "Previous forecast evaluated"
            );

            evaluations.insert(
                metric,
                MetricEvaluation {
                    report: evaluation.report,
                    mean_residual: evaluation.mean_residual,
                    aligned: evaluation.aligned,
                    previous_bias,
                    bias,
                },
            );
        }

        evaluations
    }
}

fn merge(raw: &[SeriesPoint], corrected: &[SeriesPoint]) -> Vec<ForecastPoint> {
    raw.iter()
        .zip(corrected)
        .map(|(r, c)| ForecastPoint {
            timestamp: r.timestamp,
            raw_value: r.value,
            corrected_value: c.value,
        })
        .collect()
}

/// Nearest-term corrected value of each metric that has a forecast
fn advisory_input(forecasts: &BTreeMap<Metric, Vec<ForecastPoint>>) -> AdvisoryInput {
    let mut input = AdvisoryInput::default();
    for (metric, points) in forecasts {
        if let Some(first) = points.first() {
            input.set(*metric, first.corrected_value);
        }
    }
    input
}
