//! Supervise a process unit and an in-process engine side by side
//!
//! Run with: `cargo run --example mixed_units -p overseer-supervisor`
//! Stop with ctrl-c.

use async_trait::async_trait;
use overseer_core::config::SupervisorSettings;
use overseer_core::controller::UnitController;
use overseer_supervisor::{Supervisor, UnitSpec, wait_for_shutdown_signal};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Fails every third cycle to show the error backoff
#[derive(Default)]
struct FlakyEngine {
    cycle: AtomicU32,
}

#[async_trait]
impl UnitController for FlakyEngine {
    async fn start(&self) -> anyhow::Result<()> {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        if cycle % 3 == 0 {
            anyhow::bail!("cycle {} failed", cycle);
        }
        println!("engine cycle {} done", cycle);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = SupervisorSettings {
        health_tick: Duration::from_secs(2),
        engine_error_backoff: Duration::from_secs(5),
        status_interval: Duration::from_secs(10),
        ..SupervisorSettings::default()
    };
    let supervisor = Arc::new(Supervisor::new(settings));

    // exits after a few seconds; the monitor restarts it until the budget runs out
    supervisor.register(
        UnitSpec::process("short-lived", "sh")
            .with_args(["-c", "echo working; sleep 3"])
            .with_priority(10)
            .with_startup_delay(Duration::from_secs(1))
            .with_health_interval(Duration::from_secs(2))
            .with_restart_budget(3, Duration::from_secs(60)),
    )?;

    let factory = || -> anyhow::Result<Arc<dyn UnitController>> {
        Ok(Arc::new(FlakyEngine::default()))
    };
    supervisor.register(
        UnitSpec::in_process("flaky-engine", Arc::new(factory), Duration::from_secs(1))
            .with_priority(5),
    )?;

    let report = supervisor.start_all().await;
    println!("started: {:?}", report.started);

    let monitor = supervisor.spawn_health_monitor();
    let reporter = supervisor.spawn_status_reporter();

    wait_for_shutdown_signal().await?;
    let report = supervisor.shutdown().await;
    monitor.await?;
    reporter.await?;

    println!("stopped: {:?}", report.stopped);
    print!("{}", supervisor.status());
    Ok(())
}
