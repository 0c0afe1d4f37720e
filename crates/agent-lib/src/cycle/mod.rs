//! Forecast cycle control
//!
//! This module provides:
//! - Cooldown-gated scheduling of forecast cycles
//! - The orchestrator that owns the sample window and cross-cycle state
//! - The polling loop connecting the feed, orchestrator, sink and model store

mod r#loop;
mod orchestrator;
mod scheduler;


pub use orchestrator::{
    CycleOrchestrator, CycleOutcome, CycleState, MetricEvaluation, OrchestratorConfig,
};
pub use r#loop::{AgentLoop, AgentLoopBuilder, LoopConfig, PollOutcome};
pub use scheduler::{CycleScheduler, SchedulerState, DEFAULT_COOLDOWN};
