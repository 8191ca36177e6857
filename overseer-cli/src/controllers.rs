//! Controllers built into the `overseer` binary

use async_trait::async_trait;
use overseer_core::controller::UnitController;
use overseer_supervisor::ControllerCatalog;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Logs a heartbeat every cycle
#[derive(Debug, Default)]
pub struct HeartbeatController {
    beats: AtomicU64,
}

impl HeartbeatController {
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitController for HeartbeatController {
    async fn start(&self) -> anyhow::Result<()> {
        let beat = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
        info!(beat, "heartbeat");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(beats = self.beats(), "heartbeat stopping");
        Ok(())
    }
}

/// Catalog of every built-in controller, by manifest name
pub fn catalog() -> ControllerCatalog {
    let mut catalog = ControllerCatalog::new();
    catalog.register_default::<HeartbeatController>("heartbeat");
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_heartbeat() {
        let catalog = catalog();
        assert!(catalog.get("heartbeat").is_some());
        assert!(catalog.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_heartbeat_counts_cycles() {
        let controller = HeartbeatController::default();
        controller.start().await.unwrap();
        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.beats(), 2);
    }
}
