//! Configuration types for the Overseer supervisor

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OverseerError, Result};
use crate::unit::UnitKind;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "overseer.toml";

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "OVERSEER_CONFIG_PATH";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "OVERSEER_";

/// Main configuration: supervisor settings plus the unit manifest
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OverseerConfig {
    /// Supervisor-wide timing settings
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Units to register, in registration order
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

/// Supervisor-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Period of the health monitor tick
    #[serde(with = "humantime_serde")]
    pub health_tick: Duration,

    /// How long a stop waits for graceful exit before escalating
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Pause between consecutive stops during `stop_all`
    #[serde(with = "humantime_serde")]
    pub stop_delay: Duration,

    /// Pause between the stop and start halves of a restart
    #[serde(with = "humantime_serde")]
    pub restart_delay: Duration,

    /// Sleep after an engine cycle fails, instead of the run interval
    #[serde(with = "humantime_serde")]
    pub engine_error_backoff: Duration,

    /// Period of the status reporter
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Where the status reporter writes the JSON snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            health_tick: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
            stop_delay: Duration::from_secs(1),
            restart_delay: Duration::from_secs(2),
            engine_error_backoff: Duration::from_secs(60),
            status_interval: Duration::from_secs(300),
            status_file: None,
        }
    }
}

/// One unit in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Unique unit ID
    pub id: String,

    /// Start priority; higher starts first and stops last
    #[serde(default)]
    pub priority: i32,

    /// Whether `start_all` starts this unit
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether the restart policy may restart this unit
    #[serde(default = "default_true")]
    pub auto_restart: bool,

    /// Wait after starting this unit before starting the next one
    #[serde(default, with = "humantime_serde")]
    pub startup_delay: Duration,

    /// Minimum time between health probes
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub health_interval: Duration,

    /// Automatic restarts allowed inside `restart_window`
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Rolling window for the restart budget
    #[serde(default = "default_restart_window", with = "humantime_serde")]
    pub restart_window: Duration,

    /// How the unit is launched
    pub launch: LaunchConfig,
}

fn default_true() -> bool {
    true
}

fn default_health_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_restarts() -> u32 {
    5
}

fn default_restart_window() -> Duration {
    Duration::from_secs(300)
}

fn default_run_interval() -> Duration {
    Duration::from_secs(3600)
}

/// Launch descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaunchConfig {
    /// Spawn an external process
    Process {
        /// Executable path or name resolved through `PATH`
        command: String,

        /// Arguments
        #[serde(default)]
        args: Vec<String>,

        /// Working directory (defaults to the supervisor's)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<PathBuf>,

        /// Extra environment variables on top of the inherited environment
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
    },

    /// Drive a registered controller in a run loop
    InProcess {
        /// Name of the controller in the controller catalog
        controller: String,

        /// Sleep between work cycles
        #[serde(default = "default_run_interval", with = "humantime_serde")]
        run_interval: Duration,
    },
}

impl LaunchConfig {
    /// Kind of unit this descriptor launches
    pub fn kind(&self) -> UnitKind {
        match self {
            LaunchConfig::Process { .. } => UnitKind::Process,
            LaunchConfig::InProcess { .. } => UnitKind::InProcess,
        }
    }
}

impl OverseerConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `overseer.toml` in the working directory
    /// 3. File named by `OVERSEER_CONFIG_PATH`
    /// 4. `OVERSEER_*` environment overrides, nested keys split on `__`
    ///    (for example `OVERSEER_SUPERVISOR__HEALTH_TICK=10s`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or validation fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        let figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG_PATH"])
                .split("__"),
        );

        let config: OverseerConfig = figment.extract().map_err(|e| {
            OverseerError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// Environment overrides still apply on top of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or validation fails.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(OverseerError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: OverseerConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            )
            .extract()
            .map_err(|e| {
                OverseerError::Configuration(format!(
                    "Failed to load configuration file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid unit.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for unit in &self.units {
            if unit.id.trim().is_empty() {
                return Err(OverseerError::Configuration(
                    "Unit with empty id".to_string(),
                ));
            }
            if !seen.insert(unit.id.as_str()) {
                return Err(OverseerError::Configuration(format!(
                    "Duplicate unit id: {}",
                    unit.id
                )));
            }
            if unit.health_interval.is_zero() {
                return Err(OverseerError::Configuration(format!(
                    "Unit {}: health_interval must be greater than zero",
                    unit.id
                )));
            }
            if unit.restart_window.is_zero() {
                return Err(OverseerError::Configuration(format!(
                    "Unit {}: restart_window must be greater than zero",
                    unit.id
                )));
            }

            match &unit.launch {
                LaunchConfig::Process { command, .. } if command.trim().is_empty() => {
                    return Err(OverseerError::Configuration(format!(
                        "Unit {}: process command is empty",
                        unit.id
                    )));
                }
                LaunchConfig::InProcess { controller, .. } if controller.trim().is_empty() => {
                    return Err(OverseerError::Configuration(format!(
                        "Unit {}: controller name is empty",
                        unit.id
                    )));
                }
                LaunchConfig::InProcess { run_interval, .. } if run_interval.is_zero() => {
                    return Err(OverseerError::Configuration(format!(
                        "Unit {}: run_interval must be greater than zero",
                        unit.id
                    )));
                }
                _ => {}
            }
        }

        if self.supervisor.health_tick.is_zero() {
            return Err(OverseerError::Configuration(
                "supervisor.health_tick must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Units sorted by start order: priority descending, ties in manifest order
    pub fn startup_order(&self) -> Vec<&UnitConfig> {
        let mut units: Vec<&UnitConfig> = self.units.iter().collect();
        units.sort_by(|a, b| b.priority.cmp(&a.priority));
        units
    }

    /// Units sorted by stop order: priority ascending, ties in manifest order
    pub fn shutdown_order(&self) -> Vec<&UnitConfig> {
        let mut units: Vec<&UnitConfig> = self.units.iter().collect();
        units.sort_by(|a, b| a.priority.cmp(&b.priority));
        units
    }
}
