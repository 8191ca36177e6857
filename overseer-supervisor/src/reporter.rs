//! Periodic status reporting

use crate::{Result, Supervisor};
use overseer_core::unit::SystemStatus;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

impl Supervisor {
    /// Current system status
    pub fn status(&self) -> SystemStatus {
        SystemStatus::from_units(self.registry.list())
    }

    /// Log a status summary and write the status file when one is configured
    pub async fn report_status(&self) -> Result<SystemStatus> {
        let status = self.status();
        info!(
            running = status.running,
            total = status.total,
            unhealthy = status.unhealthy,
            disabled = status.disabled,
            "{}",
            status.summary()
        );

        if let Some(path) = &self.settings.status_file {
            write_status_file(path, &status).await?;
        }
        Ok(status)
    }

    /// Run [`Supervisor::report_status`] every `status_interval` until shutdown
    pub fn spawn_status_reporter(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let cancel = self.cancel.clone();
        let period = self.settings.status_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = supervisor.report_status().await {
                            error!(error = %e, "failed to write status report");
                        }
                    }
                }
            }
        })
    }
}

/// Write `status` as JSON, replacing `path` atomically
pub async fn write_status_file(path: &Path, status: &SystemStatus) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(status)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read a status file written by [`write_status_file`]
pub async fn read_status_file(path: &Path) -> Result<SystemStatus> {
    let json = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::unit::{UnitKind, UnitSnapshot, UnitStatus};

    fn snapshot(id: &str, status: UnitStatus) -> UnitSnapshot {
        UnitSnapshot {
            id: id.to_string(),
            kind: UnitKind::Process,
            priority: 1,
            status,
            pid: None,
            started_at: None,
            last_health_check: None,
            restart_count_in_window: 0,
            auto_restart: true,
        }
    }

    #[tokio::test]
    async fn test_status_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("system_status.json");

        let first = SystemStatus::from_units(vec![snapshot("a", UnitStatus::Running)]);
        write_status_file(&path, &first).await.unwrap();

        let second = SystemStatus::from_units(vec![
            snapshot("a", UnitStatus::Running),
            snapshot("b", UnitStatus::Disabled),
        ]);
        write_status_file(&path, &second).await.unwrap();

        let read = read_status_file(&path).await.unwrap();
        assert_eq!(read, second);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_status_file(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, crate::SupervisorError::Io(_)));
    }
}
