//! Shutdown: OS signals and a stop-all that runs exactly once
//!
//! Unix: SIGINT, SIGTERM and SIGQUIT, plus [`tokio::signal::ctrl_c`].
//! Elsewhere only ctrl-c is awaited.

use crate::{SequenceReport, Supervisor};
use tracing::info;

/// Complete when the process receives a termination signal
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c"),
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigquit.recv() => info!("received SIGQUIT"),
    }
    Ok(())
}

/// Complete when the process receives ctrl-c
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c");
    Ok(())
}

impl Supervisor {
    /// Cancel background tasks and stop all units.
    ///
    /// The stop sequence runs once; concurrent and later callers wait for it and
    /// get the same report.
    pub async fn shutdown(&self) -> SequenceReport {
        self.shutdown
            .get_or_init(|| async {
                info!("shutting down supervisor");
                self.cancel.cancel();
                self.stop_all().await
            })
            .await
            .clone()
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
