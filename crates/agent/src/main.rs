//! Envcast agent - streaming environmental forecasting
//!
//! Polls a sensor feed, forecasts temperature, humidity and CO2 a few
//! minutes ahead, corrects each forecast with its own recent error, and
//! publishes forecast, accuracy and advice back to the sink.

use anyhow::{bail, Context, Result};
use clap::Parser;
use envcast_lib::{
    cycle::{AgentLoopBuilder, CycleOrchestrator, CycleScheduler, OrchestratorConfig},
    evaluation::AccuracyEvaluator,
    forecast::{EngineConfig, ForecastEngine, LinearTrendModel},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    sync::{FileModelStore, HttpResultSink, HttpSensorFeed},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "envcast-agent", version, about = "Streaming environmental forecasting agent")]
struct Args {
    /// Configuration file; ENVCAST_* variables take precedence
    #[arg(short, long, env = "ENVCAST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();

    info!("Starting envcast-agent");

    let config = config::AgentConfig::load(args.config.as_deref())?;
    let sink_url = config.sink_url()?;
    info!(
        agent_name = %config.agent_name,
        feed_url = %config.feed_url,
        sink_url = %sink_url,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.agent_name);

    let backend = Arc::new(LinearTrendModel::new());
    let engine = ForecastEngine::new(
        backend,
        EngineConfig {
            step: config.forecast_step(),
            fit_timeout: config.fit_timeout(),
        },
    );
    logger.log_startup(AGENT_VERSION, engine.backend_name());

    let orchestrator = CycleOrchestrator::new(
        OrchestratorConfig {
            capacity: config.buffer_capacity,
            horizon: config.forecast_horizon,
        },
        CycleScheduler::new(config.cooldown()?),
        engine,
        AccuracyEvaluator::new(config.alignment_tolerance()),
    );

    let feed = HttpSensorFeed::new(&config.feed_url, config.request_timeout())
        .context("Failed to create sensor feed")?;
    let sink = HttpResultSink::new(&sink_url, config.request_timeout())
        .context("Failed to create result sink")?;

    let mut builder = AgentLoopBuilder::new()
        .feed(Arc::new(feed))
        .sink(Arc::new(sink))
        .orchestrator(orchestrator)
        .poll_interval(config.poll_interval())
        .metrics(metrics.clone())
        .logger(logger.clone())
        .health(health_registry.clone());
    if config.persist_model {
        builder = builder.store(
            Arc::new(FileModelStore::new(&config.model_path)),
            config.persisted_metric()?,
        );
    }
    let agent_loop = builder.build()?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(agent_loop.run(shutdown_rx));
    let loop_watch = watch_loop(loop_handle, health_registry);
    tokio::pin!(loop_watch);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
        result = &mut loop_watch => {
            logger.log_shutdown("Forecast loop stopped");
            result?;
            bail!("Forecast loop exited before shutdown was requested");
        }
    }

    // Receiver may already be gone if the loop exited on its own
    let _ = shutdown_tx.send(());
    loop_watch.await?;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for the forecast loop task and report an abnormal exit
async fn watch_loop(handle: JoinHandle<()>, health: HealthRegistry) -> Result<()> {
    match handle.await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "Forecast loop task failed");
            health
                .set_unhealthy(components::FORECASTER, format!("forecast loop stopped: {}", e))
                .await;
            Err(anyhow::Error::new(e).context("Forecast loop task failed"))
        }
    }
}
