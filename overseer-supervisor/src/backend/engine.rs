//! In-process backend: runs a controller in a dedicated run loop

use super::{StopOutcome, UnitBackend, UnitHandle};
use crate::spec::Launch;
use crate::{Result, SupervisorError, UnitSpec};
use async_trait::async_trait;
use overseer_core::controller::UnitController;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A running engine loop
pub struct EngineHandle {
    controller: Arc<dyn UnitController>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl EngineHandle {
    /// Spawn the run loop for `controller` on its own task
    pub fn spawn(
        unit: &str,
        controller: Arc<dyn UnitController>,
        run_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_loop(
            unit.to_string(),
            controller.clone(),
            cancel.clone(),
            run_interval,
            error_backoff,
        ));

        Self {
            controller,
            cancel,
            join,
        }
    }

    /// Whether the loop task is still running (it has neither returned nor panicked)
    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("alive", &self.is_alive())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn run_loop(
    unit: String,
    controller: Arc<dyn UnitController>,
    cancel: CancellationToken,
    run_interval: Duration,
    error_backoff: Duration,
) {
    info!(unit = %unit, ?run_interval, "engine loop started");

    while !cancel.is_cancelled() {
        let pause = match controller.start().await {
            Ok(()) => {
                debug!(unit = %unit, ?run_interval, "engine cycle completed");
                run_interval
            }
            Err(e) => {
                error!(unit = %unit, error = %e, backoff = ?error_backoff, "engine cycle failed");
                error_backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!(unit = %unit, "engine loop stopped");
}

/// Runs in-process units on tokio tasks
#[derive(Debug, Clone)]
pub struct EngineBackend {
    error_backoff: Duration,
}

impl EngineBackend {
    /// Create an engine backend; failed cycles sleep `error_backoff` before retrying
    pub fn new(error_backoff: Duration) -> Self {
        Self { error_backoff }
    }
}

impl Default for EngineBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl UnitBackend for EngineBackend {
    async fn start(&self, spec: &UnitSpec) -> Result<UnitHandle> {
        let Launch::InProcess(launch) = &spec.launch else {
            return Err(SupervisorError::InvalidSpec {
                unit: spec.id.clone(),
                reason: "engine backend requires an in-process launch descriptor".to_string(),
            });
        };

        let controller = launch
            .factory
            .create()
            .map_err(|e| SupervisorError::spawn(&spec.id, format!("controller init failed: {}", e)))?;

        Ok(UnitHandle::Engine(EngineHandle::spawn(
            &spec.id,
            controller,
            launch.run_interval,
            self.error_backoff,
        )))
    }

    fn probe(&self, unit: &str, handle: &mut UnitHandle) -> Result<bool> {
        match handle {
            UnitHandle::Engine(engine) => Ok(engine.is_alive()),
            _ => Err(SupervisorError::probe(unit, "not an engine handle")),
        }
    }

    async fn stop(&self, unit: &str, handle: UnitHandle, stop_timeout: Duration) -> Result<StopOutcome> {
        let UnitHandle::Engine(engine) = handle else {
            return Err(SupervisorError::Process(format!(
                "unit {} does not hold an engine handle",
                unit
            )));
        };
        let EngineHandle {
            controller,
            cancel,
            mut join,
        } = engine;

        if join.is_finished() {
            if let Err(e) = (&mut join).await {
                warn!(unit = %unit, error = %e, "engine loop had already failed");
            }
            return Ok(StopOutcome::AlreadyExited);
        }

        cancel.cancel();
        // the stop request and the loop exit share one deadline
        let stopped = timeout(stop_timeout, async {
            if let Err(e) = controller.stop().await {
                warn!(unit = %unit, error = %e, "controller stop request failed");
            }
            (&mut join).await
        })
        .await;

        match stopped {
            Ok(Ok(())) => Ok(StopOutcome::Graceful),
            Ok(Err(e)) => {
                warn!(unit = %unit, error = %e, "engine loop ended with a failure");
                Ok(StopOutcome::Graceful)
            }
            Err(_) => {
                // a cycle that never yields cannot be pre-empted; drop it on the floor
                join.abort();
                warn!(unit = %unit, timeout = ?stop_timeout, "engine did not stop in time, abandoned");
                Err(SupervisorError::StopTimeout {
                    unit: unit.to_string(),
                    timeout: stop_timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        cycles: AtomicUsize,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl UnitController for Counting {
        async fn start(&self) -> anyhow::Result<()> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing(AtomicUsize);

    #[async_trait]
    impl UnitController for Failing {
        async fn start(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("upstream unavailable")
        }
    }

    struct Stuck;

    #[async_trait]
    impl UnitController for Stuck {
        async fn start(&self) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Runs its cycles but never acknowledges a stop request
    struct IgnoresStop;

    #[async_trait]
    impl UnitController for IgnoresStop {
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl UnitController for Panicking {
        async fn start(&self) -> anyhow::Result<()> {
            panic!("engine bug")
        }
    }

    fn spec_for(controller: Arc<dyn UnitController>, run_interval: Duration) -> UnitSpec {
        let factory = move || -> anyhow::Result<Arc<dyn UnitController>> { Ok(controller.clone()) };
        UnitSpec::in_process("engine", Arc::new(factory), run_interval)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_cycles_until_stopped() {
        let controller = Arc::new(Counting::default());
        let backend = EngineBackend::default();
        let mut handle = backend
            .start(&spec_for(controller.clone(), Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(controller.cycles.load(Ordering::SeqCst), 3);
        assert!(backend.probe("engine", &mut handle).unwrap());

        let outcome = backend
            .stop("engine", handle, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, StopOutcome::Graceful);
        assert!(controller.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_uses_error_backoff() {
        let controller = Arc::new(Failing(AtomicUsize::new(0)));
        let backend = EngineBackend::new(Duration::from_secs(60));
        let handle = backend
            .start(&spec_for(controller.clone(), Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        // one immediate attempt, the next waits for the 60s backoff
        assert_eq!(controller.0.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(controller.0.load(Ordering::SeqCst), 2);

        backend
            .stop("engine", handle, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_cycle_is_abandoned() {
        let backend = EngineBackend::default();
        let handle = backend
            .start(&spec_for(Arc::new(Stuck), Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        let err = backend
            .stop("engine", handle, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::StopTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_stop_request_times_out() {
        let backend = EngineBackend::default();
        let handle = backend
            .start(&spec_for(Arc::new(IgnoresStop), Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        let stopped = timeout(
            Duration::from_secs(3600),
            backend.stop("engine", handle, Duration::from_secs(5)),
        )
        .await
        .expect("stop must respect its own timeout");

        assert!(matches!(stopped, Err(SupervisorError::StopTimeout { .. })));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_reports_dead() {
        let backend = EngineBackend::default();
        let mut handle = backend
            .start(&spec_for(Arc::new(Panicking), Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!backend.probe("engine", &mut handle).unwrap());

        let outcome = backend
            .stop("engine", handle, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, StopOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn test_factory_error_is_spawn_error() {
        let factory = || -> anyhow::Result<Arc<dyn UnitController>> { anyhow::bail!("no model") };
        let spec = UnitSpec::in_process("engine", Arc::new(factory), Duration::from_secs(1));

        let err = EngineBackend::default().start(&spec).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }
}
