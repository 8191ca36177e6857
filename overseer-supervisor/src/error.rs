//! Error types for supervisor operations

use std::time::Duration;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error types for supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Unit already registered: {0}")]
    DuplicateUnit(String),

    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// The backend could not launch the unit. Never counted against the restart budget.
    #[error("Failed to start unit {unit}: {reason}")]
    Spawn { unit: String, reason: String },

    #[error("Health probe failed for unit {unit}: {reason}")]
    Probe { unit: String, reason: String },

    #[error("Unit {unit} did not stop within {timeout:?}")]
    StopTimeout { unit: String, timeout: Duration },

    #[error("Restart budget exhausted for unit {unit}: {max_restarts} restarts within {window:?}")]
    RestartBudgetExhausted {
        unit: String,
        max_restarts: u32,
        window: Duration,
    },

    /// Shutdown has begun; no unit may be launched any more
    #[error("Supervisor is shutting down, not starting unit {0}")]
    ShuttingDown(String),

    #[error("Invalid unit {unit}: {reason}")]
    InvalidSpec { unit: String, reason: String },

    #[error("Unit {unit} references unknown controller: {controller}")]
    UnknownController { unit: String, controller: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] overseer_core::error::OverseerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    pub(crate) fn spawn(unit: &str, reason: impl ToString) -> Self {
        SupervisorError::Spawn {
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn probe(unit: &str, reason: impl ToString) -> Self {
        SupervisorError::Probe {
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }
}
