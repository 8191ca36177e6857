//! Health monitor: one coarse tick, per-unit probe intervals

use crate::registry::UnitEntry;
use crate::Supervisor;
use overseer_core::unit::UnitStatus;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one health tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HealthTick {
    /// Units probed this tick
    pub probed: usize,
    /// Probed units found dead
    pub failed: usize,
    /// Units skipped because another operation held their lock
    pub busy: usize,
}

enum Probe {
    NotDue,
    Alive,
    Dead,
}

impl Supervisor {
    /// Probe every running or unhealthy unit whose `health_interval` has elapsed.
    ///
    /// Dead units go through the restart policy. Failures stay inside the tick.
    /// Once shutdown has begun the tick does nothing.
    pub async fn health_tick(&self) -> HealthTick {
        let mut tick = HealthTick::default();

        for entry in self.registry.entries() {
            if self.cancel.is_cancelled() {
                debug!("shutdown in progress, ending health tick early");
                break;
            }
            if !entry.state().status.is_monitored() {
                continue;
            }
            self.check_unit(&entry, &mut tick).await;
        }

        debug!(probed = tick.probed, failed = tick.failed, busy = tick.busy, "health tick complete");
        tick
    }

    async fn check_unit(&self, entry: &UnitEntry, tick: &mut HealthTick) {
        let spec = entry.spec();
        let Some(_op) = entry.try_lock_op() else {
            debug!(unit = %spec.id, "operation in flight, skipping probe");
            tick.busy += 1;
            return;
        };

        let probe = {
            let mut state = entry.state();
            let due = state
                .last_health_check
                .is_none_or(|last| Instant::now().saturating_duration_since(last) >= spec.health_interval);

            if !state.status.is_monitored() || !due {
                Probe::NotDue
            } else {
                state.mark_checked();
                let backend = self.backends.for_kind(spec.kind());
                let alive = match state.handle.as_mut() {
                    Some(handle) => backend.probe(&spec.id, handle).unwrap_or_else(|e| {
                        warn!(unit = %spec.id, error = %e, "health probe failed");
                        false
                    }),
                    None => false,
                };

                let previous = state.status;
                if alive {
                    state.status = UnitStatus::Running;
                    if previous == UnitStatus::Unhealthy {
                        info!(unit = %spec.id, "unit healthy again");
                    }
                    Probe::Alive
                } else {
                    state.status = UnitStatus::Unhealthy;
                    warn!(unit = %spec.id, previous = %previous, "unit unhealthy");
                    Probe::Dead
                }
            }
        };

        match probe {
            Probe::NotDue => {}
            Probe::Alive => tick.probed += 1,
            Probe::Dead => {
                tick.probed += 1;
                tick.failed += 1;
                self.on_unhealthy_locked(entry).await;
            }
        }
    }

    /// Run [`Supervisor::health_tick`] every `health_tick` until shutdown
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = self.settings.health_tick;

        tokio::spawn(async move {
            info!(tick = ?period, "health monitor started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        supervisor.health_tick().await;
                    }
                }
            }
            info!("health monitor stopped");
        })
    }
}
