//! Backends that realise units: OS processes and in-process engines
//!
//! Both share the [`UnitBackend`] contract. The supervisor picks the backend
//! from the unit kind and never looks inside the handle it gets back.

mod engine;
mod process;

pub use engine::{EngineBackend, EngineHandle};
pub use process::{ProcessBackend, ProcessHandle};

use crate::{Result, UnitSpec};
use async_trait::async_trait;
use overseer_core::unit::UnitKind;
use std::sync::Arc;
use std::time::Duration;

/// Handle to a started unit
#[derive(Debug)]
pub enum UnitHandle {
    /// Spawned OS process
    Process(ProcessHandle),
    /// In-process run loop
    Engine(EngineHandle),
    /// Key for backends that track their own resources
    Opaque(u64),
}

impl UnitHandle {
    /// OS process ID, for process handles
    pub fn pid(&self) -> Option<u32> {
        match self {
            UnitHandle::Process(handle) => Some(handle.pid()),
            _ => None,
        }
    }
}

/// How a stop completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The unit had already exited; nothing was signalled
    AlreadyExited,
    /// The unit exited within the timeout
    Graceful,
    /// The unit ignored the graceful request and was killed
    Forced,
}

/// Start, probe and stop units of one kind
#[async_trait]
pub trait UnitBackend: Send + Sync {
    /// Launch the unit described by `spec`.
    ///
    /// A launch failure must not leave anything running behind.
    async fn start(&self, spec: &UnitSpec) -> Result<UnitHandle>;

    /// Non-blocking liveness check. `Err` means the check itself failed.
    fn probe(&self, unit: &str, handle: &mut UnitHandle) -> Result<bool>;

    /// Stop the unit, waiting up to `timeout` for a graceful exit
    async fn stop(&self, unit: &str, handle: UnitHandle, timeout: Duration) -> Result<StopOutcome>;
}

/// One backend per unit kind
#[derive(Clone)]
pub struct Backends {
    process: Arc<dyn UnitBackend>,
    in_process: Arc<dyn UnitBackend>,
}

impl Backends {
    /// Pair explicit backends
    pub fn new(process: Arc<dyn UnitBackend>, in_process: Arc<dyn UnitBackend>) -> Self {
        Self {
            process,
            in_process,
        }
    }

    /// Use the same backend for every kind
    pub fn uniform(backend: Arc<dyn UnitBackend>) -> Self {
        Self::new(backend.clone(), backend)
    }

    /// Default OS process backend plus an engine backend using `engine_error_backoff`
    pub fn standard(engine_error_backoff: Duration) -> Self {
        Self::new(
            Arc::new(ProcessBackend::new()),
            Arc::new(EngineBackend::new(engine_error_backoff)),
        )
    }

    /// Backend for `kind`
    pub fn for_kind(&self, kind: UnitKind) -> &Arc<dyn UnitBackend> {
        match kind {
            UnitKind::Process => &self.process,
            UnitKind::InProcess => &self.in_process,
        }
    }
}
