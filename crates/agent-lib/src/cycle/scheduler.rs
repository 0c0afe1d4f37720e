//! Forecast cycle scheduling
//!
//! A cycle becomes due when the window is full and either no cycle has
//! run yet or the cooldown since the last completed cycle has elapsed.

use std::time::{Duration, Instant};

/// Default minimum time between cycles (5 minutes)
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Scheduling decision for one append event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing to do
    Idle,
    /// A cycle must run now
    Ready,
}

/// Cooldown-gated cycle scheduler.
///
/// The last completion time lives in the orchestrator's cycle state, so
/// the scheduler only carries policy. Pending cycles never queue: each
/// append yields at most one `Ready`.
#[derive(Debug, Clone)]
pub struct CycleScheduler {
    cooldown: Duration,
}

impl Default for CycleScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CycleScheduler {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether the append observed at `now` triggers a cycle
    pub fn on_append(
        &self,
        buffer_full: bool,
        last_cycle: Option<Instant>,
        now: Instant,
    ) -> SchedulerState {
        if !buffer_full {
            return SchedulerState::Idle;
        }
        match last_cycle {
            None => SchedulerState::Ready,
            Some(last) if now.saturating_duration_since(last) >= self.cooldown => {
                SchedulerState::Ready
            }
            Some(_) => SchedulerState::Idle,
        }
    }

    /// Time left before a full buffer would trigger a cycle
    pub fn remaining(&self, last_cycle: Option<Instant>, now: Instant) -> Duration {
        match last_cycle {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }
}
