//! The supervisor: registry, backends and settings behind one handle

use crate::backend::Backends;
use crate::registry::UnitRegistry;
use crate::{ControllerCatalog, Result, SequenceReport, UnitSpec};
use overseer_core::config::{OverseerConfig, SupervisorSettings};
use overseer_core::unit::UnitSnapshot;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Supervises a set of units.
///
/// Lifecycle operations live in `lifecycle`, probing in `health`, the restart
/// budget in `restart`. Wrap it in an [`Arc`] to run the background tasks.
pub struct Supervisor {
    pub(crate) registry: UnitRegistry,
    pub(crate) backends: Backends,
    pub(crate) settings: SupervisorSettings,
    pub(crate) cancel: CancellationToken,
    pub(crate) shutdown: OnceCell<SequenceReport>,
}

impl Supervisor {
    /// Create a supervisor with the standard process and engine backends
    pub fn new(settings: SupervisorSettings) -> Self {
        let backends = Backends::standard(settings.engine_error_backoff);
        Self::with_backends(settings, backends)
    }

    /// Create a supervisor with custom backends
    pub fn with_backends(settings: SupervisorSettings, backends: Backends) -> Self {
        Self {
            registry: UnitRegistry::new(),
            backends,
            settings,
            cancel: CancellationToken::new(),
            shutdown: OnceCell::new(),
        }
    }

    /// Validate a configuration and register every unit it declares
    pub fn from_config(config: &OverseerConfig, catalog: &ControllerCatalog) -> Result<Self> {
        config.validate()?;

        let supervisor = Self::new(config.supervisor.clone());
        for unit in &config.units {
            supervisor.register(UnitSpec::from_config(unit, catalog)?)?;
        }

        info!(units = supervisor.registry.len(), "supervisor configured");
        Ok(supervisor)
    }

    /// Register a unit
    pub fn register(&self, spec: UnitSpec) -> Result<()> {
        let entry = self.registry.register(spec)?;
        info!(
            unit = %entry.id(),
            kind = %entry.spec().kind(),
            priority = entry.spec().priority,
            "unit registered"
        );
        Ok(())
    }

    /// Snapshot of one unit
    pub fn get(&self, id: &str) -> Result<UnitSnapshot> {
        self.registry.get(id)
    }

    /// Snapshots of all units, in registration order
    pub fn list(&self) -> Vec<UnitSnapshot> {
        self.registry.list()
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Token cancelled when shutdown begins
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
