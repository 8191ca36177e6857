//! Unit specifications and the controller catalog

use crate::{Result, SupervisorError};
use overseer_core::config::{LaunchConfig, UnitConfig};
use overseer_core::controller::{ControllerFactory, UnitController};
use overseer_core::unit::UnitKind;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Launch descriptor for a process unit
#[derive(Debug, Clone)]
pub struct ProcessLaunch {
    /// Executable path or name resolved through `PATH`
    pub command: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub working_dir: Option<PathBuf>,
    /// Extra environment on top of the supervisor's environment
    pub env: BTreeMap<String, String>,
}

/// Launch descriptor for an in-process unit
#[derive(Clone)]
pub struct EngineLaunch {
    /// Builds a fresh controller on every start
    pub factory: Arc<dyn ControllerFactory>,
    /// Sleep between work cycles
    pub run_interval: Duration,
}

impl fmt::Debug for EngineLaunch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLaunch")
            .field("run_interval", &self.run_interval)
            .finish_non_exhaustive()
    }
}

/// How a unit is launched
#[derive(Debug, Clone)]
pub enum Launch {
    Process(ProcessLaunch),
    InProcess(EngineLaunch),
}

/// Immutable unit configuration
///
/// `auto_restart` here is the initial value; the registry owns the live flag
/// so the restart policy can switch it off.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub id: String,
    pub priority: i32,
    pub enabled: bool,
    pub auto_restart: bool,
    pub startup_delay: Duration,
    pub health_interval: Duration,
    pub max_restarts: u32,
    pub restart_window: Duration,
    pub launch: Launch,
}

impl UnitSpec {
    fn new(id: impl Into<String>, launch: Launch) -> Self {
        Self {
            id: id.into(),
            priority: 0,
            enabled: true,
            auto_restart: true,
            startup_delay: Duration::ZERO,
            health_interval: Duration::from_secs(30),
            max_restarts: 5,
            restart_window: Duration::from_secs(300),
            launch,
        }
    }

    /// Spec for an external process
    pub fn process(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(
            id,
            Launch::Process(ProcessLaunch {
                command: command.into(),
                args: Vec::new(),
                working_dir: None,
                env: BTreeMap::new(),
            }),
        )
    }

    /// Spec for an in-process unit driven by `factory`
    pub fn in_process(
        id: impl Into<String>,
        factory: Arc<dyn ControllerFactory>,
        run_interval: Duration,
    ) -> Self {
        Self::new(
            id,
            Launch::InProcess(EngineLaunch {
                factory,
                run_interval,
            }),
        )
    }

    /// Build a spec from a manifest entry, resolving controllers through `catalog`
    pub fn from_config(config: &UnitConfig, catalog: &ControllerCatalog) -> Result<Self> {
        let launch = match &config.launch {
            LaunchConfig::Process {
                command,
                args,
                working_dir,
                env,
            } => Launch::Process(ProcessLaunch {
                command: command.clone(),
                args: args.clone(),
                working_dir: working_dir.clone(),
                env: env.clone(),
            }),
            LaunchConfig::InProcess {
                controller,
                run_interval,
            } => Launch::InProcess(EngineLaunch {
                factory: catalog.get(controller).ok_or_else(|| {
                    SupervisorError::UnknownController {
                        unit: config.id.clone(),
                        controller: controller.clone(),
                    }
                })?,
                run_interval: *run_interval,
            }),
        };

        Ok(Self {
            id: config.id.clone(),
            priority: config.priority,
            enabled: config.enabled,
            auto_restart: config.auto_restart,
            startup_delay: config.startup_delay,
            health_interval: config.health_interval,
            max_restarts: config.max_restarts,
            restart_window: config.restart_window,
            launch,
        })
    }

    /// Unit kind, derived from the launch descriptor
    pub fn kind(&self) -> UnitKind {
        match self.launch {
            Launch::Process(_) => UnitKind::Process,
            Launch::InProcess(_) => UnitKind::InProcess,
        }
    }

    /// Builder: append process arguments (ignored for in-process units)
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Launch::Process(ref mut launch) = self.launch {
            launch.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Builder: set priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set startup delay
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Builder: set health interval
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Builder: set restart budget
    pub fn with_restart_budget(mut self, max_restarts: u32, window: Duration) -> Self {
        self.max_restarts = max_restarts;
        self.restart_window = window;
        self
    }

    /// Builder: set initial auto-restart flag
    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    /// Builder: include or exclude the unit from `start_all`
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| SupervisorError::InvalidSpec {
            unit: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if self.health_interval.is_zero() {
            return Err(invalid("health_interval must be greater than zero"));
        }
        if self.restart_window.is_zero() {
            return Err(invalid("restart_window must be greater than zero"));
        }
        match &self.launch {
            Launch::Process(launch) if launch.command.trim().is_empty() => {
                Err(invalid("process command is empty"))
            }
            Launch::InProcess(launch) if launch.run_interval.is_zero() => {
                Err(invalid("run_interval must be greater than zero"))
            }
            _ => Ok(()),
        }
    }
}

/// Named controller factories that manifest entries can refer to
#[derive(Default, Clone)]
pub struct ControllerCatalog {
    factories: HashMap<String, Arc<dyn ControllerFactory>>,
}

impl ControllerCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn ControllerFactory>) {
        self.factories.insert(name.into(), factory);
    }

    /// Register a controller type constructed with `Default` on every start
    pub fn register_default<C>(&mut self, name: impl Into<String>)
    where
        C: UnitController + Default + 'static,
    {
        let factory = || -> anyhow::Result<Arc<dyn UnitController>> { Ok(Arc::new(C::default())) };
        self.register(name, Arc::new(factory));
    }

    /// Look up a factory
    pub fn get(&self, name: &str) -> Option<Arc<dyn ControllerFactory>> {
        self.factories.get(name).cloned()
    }

    /// Registered controller names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ControllerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerCatalog")
            .field("controllers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Noop;

    #[async_trait]
    impl UnitController for Noop {
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn unit_config(id: &str, launch: LaunchConfig) -> UnitConfig {
        UnitConfig {
            id: id.to_string(),
            priority: 4,
            enabled: true,
            auto_restart: true,
            startup_delay: Duration::from_secs(2),
            health_interval: Duration::from_secs(60),
            max_restarts: 3,
            restart_window: Duration::from_secs(120),
            launch,
        }
    }

    #[test]
    fn test_builder() {
        let spec = UnitSpec::process("worker", "python3")
            .with_args(["worker.py", "--fast"])
            .with_priority(7)
            .with_startup_delay(Duration::from_secs(5))
            .with_restart_budget(2, Duration::from_secs(60));

        assert_eq!(spec.kind(), UnitKind::Process);
        assert_eq!(spec.priority, 7);
        assert_eq!(spec.max_restarts, 2);
        match &spec.launch {
            Launch::Process(launch) => assert_eq!(launch.args, ["worker.py", "--fast"]),
            Launch::InProcess(_) => panic!("expected process launch"),
        }
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_from_config_resolves_controller() {
        let mut catalog = ControllerCatalog::new();
        catalog.register_default::<Noop>("noop");

        let config = unit_config(
            "engine",
            LaunchConfig::InProcess {
                controller: "noop".to_string(),
                run_interval: Duration::from_secs(10),
            },
        );
        let spec = UnitSpec::from_config(&config, &catalog).unwrap();

        assert_eq!(spec.kind(), UnitKind::InProcess);
        assert_eq!(spec.health_interval, Duration::from_secs(60));
        assert_eq!(spec.restart_window, Duration::from_secs(120));
        assert!(matches!(spec.launch, Launch::InProcess(_)));
    }

    #[test]
    fn test_from_config_unknown_controller() {
        let config = unit_config(
            "engine",
            LaunchConfig::InProcess {
                controller: "missing".to_string(),
                run_interval: Duration::from_secs(10),
            },
        );

        let err = UnitSpec::from_config(&config, &ControllerCatalog::new()).unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownController { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let spec = UnitSpec::process("worker", "true").with_health_interval(Duration::ZERO);
        assert!(matches!(spec.validate(), Err(SupervisorError::InvalidSpec { .. })));
    }
}
