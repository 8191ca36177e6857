//! Restart policy: a rolling restart budget per unit
//!
//! Every automatic restart is recorded in a [`RestartWindow`]. When a unit turns
//! unhealthy the window is pruned to `restart_window` and compared against
//! `max_restarts`; once the budget is spent the unit is disabled for good and only
//! an operator can bring it back.

use crate::registry::UnitEntry;
use crate::{Supervisor, SupervisorError};
use overseer_core::unit::UnitStatus;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Sliding window of restart instants
#[derive(Debug, Default, Clone)]
pub struct RestartWindow {
    timestamps: VecDeque<Instant>,
}

impl RestartWindow {
    /// Drop entries older than `window` relative to `now`
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) > window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Restarts within `window` of `now`
    pub fn count(&self, now: Instant, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= window)
            .count()
    }

    /// Record a restart at `now`
    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Forget all restarts
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}

/// What the policy decided for an unhealthy unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Auto-restart is off; the unit stays unhealthy
    Escalate,
    /// A restart slot was consumed; `attempt` is its position in the window
    Restart { attempt: usize },
    /// The budget is spent; the unit is now disabled
    Exhausted,
}

/// Decide whether an unhealthy unit may be restarted, recording the restart if so
pub fn evaluate(
    window: &mut RestartWindow,
    auto_restart: bool,
    max_restarts: u32,
    restart_window: Duration,
    now: Instant,
) -> RestartDecision {
    if !auto_restart {
        return RestartDecision::Escalate;
    }

    window.prune(now, restart_window);
    let recent = window.count(now, restart_window);

    if recent < max_restarts as usize {
        window.record(now);
        RestartDecision::Restart { attempt: recent + 1 }
    } else {
        RestartDecision::Exhausted
    }
}

impl Supervisor {
    /// Apply the restart policy to an unhealthy unit.
    ///
    /// Waits for any in-flight operation on the unit to finish first.
    pub async fn on_unhealthy(&self, id: &str) -> crate::Result<RestartDecision> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;
        Ok(self.on_unhealthy_locked(&entry).await)
    }

    /// Restart policy body; the caller holds the unit's operation lock
    pub(crate) async fn on_unhealthy_locked(&self, entry: &UnitEntry) -> RestartDecision {
        let spec = entry.spec();
        let decision = {
            let mut state = entry.state();
            evaluate(
                &mut state.restarts,
                entry.auto_restart(),
                spec.max_restarts,
                spec.restart_window,
                Instant::now(),
            )
        };

        match decision {
            RestartDecision::Escalate => {
                warn!(unit = %spec.id, "unit unhealthy and auto-restart is disabled, leaving it unhealthy");
            }
            RestartDecision::Restart { attempt } => {
                warn!(
                    unit = %spec.id,
                    attempt,
                    max_restarts = spec.max_restarts,
                    "auto-restarting unhealthy unit"
                );
                match self.restart_locked(entry).await {
                    Ok(()) => {}
                    Err(SupervisorError::ShuttingDown(_)) => {
                        info!(unit = %spec.id, "shutdown began during auto-restart, leaving unit stopped");
                    }
                    Err(e) => {
                        // the slot stays consumed; the next due probe re-evaluates the budget
                        error!(unit = %spec.id, error = %e, "auto-restart failed");
                        entry.state().status = UnitStatus::Unhealthy;
                    }
                }
            }
            RestartDecision::Exhausted => {
                entry.set_auto_restart(false);
                entry.state().status = UnitStatus::Disabled;
                // a failed health check does not prove the unit exited
                if let Err(e) = self.stop_locked(entry).await {
                    warn!(unit = %spec.id, error = %e, "failed to stop unit being disabled");
                }
                let escalation = SupervisorError::RestartBudgetExhausted {
                    unit: spec.id.clone(),
                    max_restarts: spec.max_restarts,
                    window: spec.restart_window,
                };
                error!(
                    unit = %spec.id,
                    error = %escalation,
                    "auto-restart disabled, operator intervention required"
                );
            }
        }

        decision
    }

    /// Re-enable automatic restarts for a unit and forget its restart history.
    ///
    /// A disabled unit goes back to `unhealthy` so the next health tick picks it up.
    pub async fn rearm(&self, id: &str) -> crate::Result<()> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;

        entry.set_auto_restart(true);
        let mut state = entry.state();
        state.restarts.clear();
        if state.status == UnitStatus::Disabled {
            state.status = UnitStatus::Unhealthy;
            state.last_health_check = None;
        }
        info!(unit = %id, status = %state.status, "auto-restart re-armed");
        Ok(())
    }
}
