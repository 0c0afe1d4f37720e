//! Agent configuration

use anyhow::{bail, Context, Result};
use envcast_lib::forecast::MIN_SAMPLES;
use envcast_lib::sync::sink_base_from_feed;
use envcast_lib::Metric;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for every setting
const ENV_PREFIX: &str = "ENVCAST";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name reported in logs
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Sensor feed document
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Base location for published results; derived from the feed URL when unset
    #[serde(default)]
    pub sink_url: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Samples held in the window
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Minimum time between forecast cycles
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: usize,

    #[serde(default = "default_forecast_step")]
    pub forecast_step_secs: u64,

    /// Maximum distance when pairing a forecast point with a sample
    #[serde(default = "default_alignment_tolerance")]
    pub alignment_tolerance_secs: u64,

    #[serde(default = "default_fit_timeout")]
    pub fit_timeout_secs: u64,

    /// Timeout for each feed and sink request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Write the fitted model after every cycle
    #[serde(default = "default_persist_model")]
    pub persist_model: bool,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Metric whose fitted model is persisted
    #[serde(default = "default_persisted_metric")]
    pub persisted_metric: String,
}

fn default_agent_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_feed_url() -> String {
    "http://localhost:9000/SensorData.json".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_buffer_capacity() -> usize {
    30
}

fn default_cooldown_minutes() -> u64 {
    5
}

fn default_forecast_horizon() -> usize {
    5
}

fn default_forecast_step() -> u64 {
    60
}

fn default_alignment_tolerance() -> u64 {
    30
}

fn default_fit_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_persist_model() -> bool {
    true
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/carbon_model.json")
}

fn default_persisted_metric() -> String {
    "carbon".to_string()
}

impl AgentConfig {
    /// Load configuration from an optional file overlaid with `ENVCAST_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity < MIN_SAMPLES {
            bail!("buffer_capacity must be at least {}", MIN_SAMPLES);
        }
        if self.forecast_horizon == 0 {
            bail!("forecast_horizon must be at least 1");
        }
        if self.forecast_step_secs == 0 {
            bail!("forecast_step_secs must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        self.cooldown()?;
        self.persisted_metric()?;
        self.sink_url()?;
        Ok(())
    }

    pub fn persisted_metric(&self) -> Result<Metric> {
        self.persisted_metric
            .parse()
            .map_err(|e: String| anyhow::anyhow!("persisted_metric: {}", e))
    }

    /// Explicit sink location, or the feed URL's parent
    pub fn sink_url(&self) -> Result<String> {
        match &self.sink_url {
            Some(url) => Ok(url.clone()),
            None => Ok(sink_base_from_feed(&self.feed_url)?.to_string()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cooldown(&self) -> Result<Duration> {
        self.cooldown_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .context("cooldown_minutes is too large")
    }

    pub fn forecast_step(&self) -> Duration {
        Duration::from_secs(self.forecast_step_secs)
    }

    pub fn alignment_tolerance(&self) -> Duration {
        Duration::from_secs(self.alignment_tolerance_secs)
    }

    pub fn fit_timeout(&self) -> Duration {
        Duration::from_secs(self.fit_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
