//! Contract for in-process units ("engines")
//!
//! The supervisor never looks inside a controller. It calls [`UnitController::start`]
//! once per cycle from a dedicated run loop and [`UnitController::stop`] when the
//! unit is being shut down.

use async_trait::async_trait;
use std::sync::Arc;

/// An in-process unit of work
#[async_trait]
pub trait UnitController: Send + Sync {
    /// Run one cycle of work.
    ///
    /// Returning an error ends the cycle early; the run loop logs it and backs off
    /// before the next cycle. A cycle that never returns cannot be pre-empted.
    async fn start(&self) -> anyhow::Result<()>;

    /// Request cooperative exit of an in-flight cycle
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Creates a fresh controller every time the unit is (re)started
pub trait ControllerFactory: Send + Sync {
    /// Instantiate a controller
    fn create(&self) -> anyhow::Result<Arc<dyn UnitController>>;
}

impl<F> ControllerFactory for F
where
    F: Fn() -> anyhow::Result<Arc<dyn UnitController>> + Send + Sync,
{
    fn create(&self) -> anyhow::Result<Arc<dyn UnitController>> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl UnitController for Counter {
        async fn start(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_closure_factory_creates_fresh_controllers() {
        let factory = || -> anyhow::Result<Arc<dyn UnitController>> {
            Ok(Arc::new(Counter(AtomicUsize::new(0))))
        };

        let first = factory.create().unwrap();
        let second = factory.create().unwrap();
        first.start().await.unwrap();
        first.start().await.unwrap();
        second.start().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.stop().await.is_ok());
    }
}
