//! Lifecycle sequencer: ordered start/stop of all units and single-unit operations
//!
//! `start_all` walks units by priority descending and sleeps each unit's
//! `startup_delay` after a successful start, so units that compete for the same
//! resources during initialisation come up one at a time. `stop_all` walks the
//! reverse order with a fixed `stop_delay` between stops.

use crate::backend::StopOutcome;
use crate::registry::UnitEntry;
use crate::{Result, Supervisor, SupervisorError};
use chrono::Utc;
use overseer_core::unit::UnitStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Report of a sequenced start or stop
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Units that were started
    pub started: Vec<String>,
    /// Units that were stopped
    pub stopped: Vec<String>,
    /// Units whose start or stop failed
    pub failed: Vec<String>,
    /// Units left alone (disabled, not enabled, already running or nothing to stop)
    pub skipped: Vec<String>,
}

impl SequenceReport {
    /// Whether every attempted operation succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Supervisor {
    /// Start every enabled unit in priority order.
    ///
    /// A unit that fails to launch is marked `stopped` and the sequence moves on.
    pub async fn start_all(&self) -> SequenceReport {
        let mut report = SequenceReport::default();
        let order = self.registry.startup_order();
        info!(units = order.len(), "starting all units");

        for entry in order {
            let id = entry.id().to_string();

            if self.cancel.is_cancelled() {
                debug!(unit = %id, "shutdown in progress, not starting");
                report.skipped.push(id);
                continue;
            }

            if !entry.spec().enabled {
                debug!(unit = %id, "unit not enabled, skipping");
                report.skipped.push(id);
                continue;
            }

            let started = {
                let _op = entry.lock_op().await;
                if self.cancel.is_cancelled() {
                    debug!(unit = %id, "shutdown began while waiting for the unit, not starting");
                    report.skipped.push(id);
                    continue;
                }
                let status = entry.state().status;
                if status == UnitStatus::Disabled {
                    debug!(unit = %id, "unit disabled by restart policy, skipping");
                    report.skipped.push(id);
                    continue;
                }
                self.start_locked(&entry).await
            };

            match started {
                Ok(true) => {
                    report.started.push(id);
                    self.pause(entry.spec().startup_delay).await;
                }
                Ok(false) => report.skipped.push(id),
                Err(_) => report.failed.push(id),
            }
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "start sequence complete"
        );
        report
    }

    /// Stop every unit, lowest priority first.
    ///
    /// Units holding a handle go through their backend. Units without one
    /// (an unhealthy unit whose relaunch failed, say) are marked `stopped`
    /// in place and reported as skipped. `disabled` units keep their status
    /// and units never started stay `pending`.
    pub async fn stop_all(&self) -> SequenceReport {
        let mut report = SequenceReport::default();
        let order = self.registry.shutdown_order();
        info!(units = order.len(), "stopping all units");

        let mut first = true;
        for entry in order {
            let id = entry.id().to_string();
            let _op = entry.lock_op().await;

            let (has_handle, status) = {
                let state = entry.state();
                (state.handle.is_some(), state.status)
            };
            if !has_handle && status == UnitStatus::Pending {
                report.skipped.push(id);
                continue;
            }
            if has_handle {
                if !first && !self.settings.stop_delay.is_zero() {
                    tokio::time::sleep(self.settings.stop_delay).await;
                }
                first = false;
            }

            match self.stop_locked(&entry).await {
                Ok(Some(_)) => report.stopped.push(id),
                Ok(None) => report.skipped.push(id),
                Err(_) => report.failed.push(id),
            }
        }

        info!(
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "stop sequence complete"
        );
        report
    }

    /// Start one unit. Starting a unit that already holds a handle is a no-op.
    pub async fn start(&self, id: &str) -> Result<()> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;
        self.start_locked(&entry).await.map(|_| ())
    }

    /// Stop one unit. A unit without a handle is marked stopped without a backend call.
    pub async fn stop(&self, id: &str) -> Result<()> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;
        self.stop_locked(&entry).await.map(|_| ())
    }

    /// Stop then start one unit, `restart_delay` apart
    pub async fn restart(&self, id: &str) -> Result<()> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;
        self.restart_locked(&entry).await
    }

    /// Stop a unit if needed and remove it from the registry
    pub async fn deregister(&self, id: &str) -> Result<()> {
        let entry = self.registry.entry(id)?;
        let _op = entry.lock_op().await;

        if let Err(e) = self.stop_locked(&entry).await {
            warn!(unit = %id, error = %e, "stop failed during deregistration");
        }
        self.registry.remove(id)?;
        info!(unit = %id, "unit deregistered");
        Ok(())
    }

    /// Launch a unit; `Ok(false)` when it already holds a handle.
    /// The caller holds the unit's operation lock.
    ///
    /// Fails with [`SupervisorError::ShuttingDown`] once shutdown has begun.
    pub(crate) async fn start_locked(&self, entry: &UnitEntry) -> Result<bool> {
        let spec = entry.spec();
        if self.cancel.is_cancelled() {
            debug!(unit = %spec.id, "shutdown in progress, refusing to start");
            return Err(SupervisorError::ShuttingDown(spec.id.clone()));
        }
        {
            let mut state = entry.state();
            if state.handle.is_some() {
                debug!(unit = %spec.id, status = %state.status, "unit already has a handle");
                return Ok(false);
            }
            state.status = UnitStatus::Starting;
        }

        info!(unit = %spec.id, kind = %spec.kind(), priority = spec.priority, "starting unit");
        let backend = self.backends.for_kind(spec.kind());

        match backend.start(spec).await {
            Ok(handle) => {
                let pid = handle.pid();
                let mut state = entry.state();
                state.handle = Some(handle);
                state.status = UnitStatus::Running;
                state.started_at = Some(Utc::now());
                info!(unit = %spec.id, ?pid, "unit running");
                Ok(true)
            }
            Err(e) => {
                error!(unit = %spec.id, error = %e, "failed to start unit");
                let mut state = entry.state();
                state.handle = None;
                state.status = UnitStatus::Stopped;
                Err(e)
            }
        }
    }

    /// Stop a unit; `Ok(None)` when there was nothing to stop.
    /// The caller holds the unit's operation lock.
    ///
    /// The unit ends up `stopped` whatever the backend reports, except that a
    /// `disabled` unit keeps its status.
    pub(crate) async fn stop_locked(&self, entry: &UnitEntry) -> Result<Option<StopOutcome>> {
        let spec = entry.spec();
        let (handle, previous) = {
            let mut state = entry.state();
            let previous = state.status;
            let handle = state.handle.take();
            if handle.is_some() {
                state.status = UnitStatus::Stopping;
            } else if previous != UnitStatus::Disabled {
                state.status = UnitStatus::Stopped;
            }
            (handle, previous)
        };

        let Some(handle) = handle else {
            debug!(unit = %spec.id, "unit has no handle, nothing to stop");
            return Ok(None);
        };

        info!(unit = %spec.id, timeout = ?self.settings.stop_timeout, "stopping unit");
        let result = self
            .backends
            .for_kind(spec.kind())
            .stop(&spec.id, handle, self.settings.stop_timeout)
            .await;

        entry.state().status = if previous == UnitStatus::Disabled {
            UnitStatus::Disabled
        } else {
            UnitStatus::Stopped
        };

        match result {
            Ok(outcome) => {
                match outcome {
                    StopOutcome::Forced => warn!(unit = %spec.id, "unit force stopped"),
                    _ => info!(unit = %spec.id, ?outcome, "unit stopped"),
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                error!(unit = %spec.id, error = %e, "failed to stop unit cleanly");
                Err(e)
            }
        }
    }

    /// Stop, wait `restart_delay`, start. The caller holds the unit's operation lock.
    ///
    /// A failed stop does not prevent the relaunch; the handle is gone either way.
    pub(crate) async fn restart_locked(&self, entry: &UnitEntry) -> Result<()> {
        let spec = entry.spec();
        info!(unit = %spec.id, "restarting unit");

        if let Err(e) = self.stop_locked(entry).await {
            warn!(unit = %spec.id, error = %e, "stop before restart failed, relaunching anyway");
        }

        self.pause(self.settings.restart_delay).await;

        match self.start_locked(entry).await? {
            true => Ok(()),
            false => Err(SupervisorError::spawn(&spec.id, "unit still holds a handle")),
        }
    }

    /// Sleep unless zero or shutdown begins
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
