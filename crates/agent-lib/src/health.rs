//! Liveness and readiness of the forecasting agent
//!
//! Each collaborator of the forecast loop reports its own status. Liveness
//! is the worst status across all of them. Readiness only asks whether a
//! cycle has completed and the forecaster can still produce forecasts; a
//! failing sink or model store does not make stale forecasts unservable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Status of one collaborator, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Last operation failed, the loop carries on
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Most recent completed forecast cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LastCycle {
    pub cycle: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<LastCycle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<LastCycle>,
}

/// Component names for health tracking
pub mod components {
    pub const FEED: &str = "feed";
    pub const FORECASTER: &str = "forecaster";
    pub const SINK: &str = "sink";
    pub const MODEL_STORE: &str = "model_store";

    pub const ALL: [&str; 4] = [FEED, FORECASTER, SINK, MODEL_STORE];
}

#[derive(Debug, Default)]
struct HealthState {
    components: BTreeMap<String, ComponentHealth>,
    last_cycle: Option<LastCycle>,
}

/// Shared view of agent health, cloned into the loop and the API
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every component as healthy
    pub async fn register_all(&self) {
        for name in components::ALL {
            self.set(name, ComponentStatus::Healthy, None).await;
        }
    }

    pub async fn set_healthy(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.set(name, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        let health = ComponentHealth {
            status,
            message,
            updated_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    /// Note that forecast cycle `cycle` has just completed
    pub async fn record_cycle(&self, cycle: u64) {
        self.state.write().await.last_cycle = Some(LastCycle {
            cycle,
            completed_at: Utc::now(),
        });
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse {
            status,
            components: state.components.clone(),
            last_cycle: state.last_cycle,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let last_cycle = state.last_cycle;
        let forecaster = state.components.get(components::FORECASTER);

        let reason = match (last_cycle, forecaster) {
            (None, _) => Some("no forecast cycle has completed".to_string()),
            (Some(_), Some(f)) if f.status == ComponentStatus::Unhealthy => Some(format!(
                "forecaster unhealthy: {}",
                f.message.as_deref().unwrap_or("unknown")
            )),
            _ => None,
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            last_cycle,
        }
    }
}
