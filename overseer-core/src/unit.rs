//! Unit kinds, lifecycle status and read-only status snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a unit is realised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Independently spawned OS process
    Process,
    /// Controller driven by a run loop inside the supervisor
    InProcess,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Process => write!(f, "process"),
            UnitKind::InProcess => write!(f, "in_process"),
        }
    }
}

/// Lifecycle status of a unit
///
/// ```text
/// pending → starting → running ⇄ unhealthy → stopping → stopped
///                                    │
///                                    └──► disabled (restart budget exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Registered, never started
    Pending,
    /// Backend start in progress
    Starting,
    /// Started and last probe reported alive
    Running,
    /// Last probe reported dead
    Unhealthy,
    /// Backend stop in progress
    Stopping,
    /// Stopped, or failed to start
    Stopped,
    /// Restart budget exhausted; health checks skip the unit
    Disabled,
}

impl UnitStatus {
    /// Whether the health monitor probes units in this status
    pub fn is_monitored(&self) -> bool {
        matches!(self, UnitStatus::Running | UnitStatus::Unhealthy)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Starting => "starting",
            UnitStatus::Running => "running",
            UnitStatus::Unhealthy => "unhealthy",
            UnitStatus::Stopping => "stopping",
            UnitStatus::Stopped => "stopped",
            UnitStatus::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit ID
    pub id: String,
    /// Unit kind
    pub kind: UnitKind,
    /// Start priority (higher starts first)
    pub priority: i32,
    /// Current status
    pub status: UnitStatus,
    /// OS process ID, for process units that are running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// When the unit was last started
    pub started_at: Option<DateTime<Utc>>,
    /// When the unit was last probed
    pub last_health_check: Option<DateTime<Utc>>,
    /// Automatic restarts inside the current restart window
    pub restart_count_in_window: usize,
    /// Whether the restart policy may still restart this unit
    pub auto_restart: bool,
}

impl UnitSnapshot {
    /// Time since `started_at`, when the unit is running
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match self.status {
            UnitStatus::Running | UnitStatus::Unhealthy => self.started_at.map(|t| now - t),
            _ => None,
        }
    }
}

/// Aggregated status across all registered units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Registered units
    pub total: usize,
    /// Units currently running
    pub running: usize,
    /// Units whose last probe failed
    pub unhealthy: usize,
    /// Units that were stopped, by an operator, shutdown or a failed launch
    pub stopped: usize,
    /// Units never started
    #[serde(default)]
    pub pending: usize,
    /// Units disabled by the restart policy
    pub disabled: usize,
    /// Per-unit detail, in registration order
    pub units: Vec<UnitSnapshot>,
}

impl SystemStatus {
    /// Build a system status from unit snapshots
    pub fn from_units(units: Vec<UnitSnapshot>) -> Self {
        let count = |status: UnitStatus| units.iter().filter(|u| u.status == status).count();
        let running = count(UnitStatus::Running);
        let unhealthy = count(UnitStatus::Unhealthy);
        let disabled = count(UnitStatus::Disabled);
        let stopped = count(UnitStatus::Stopped);
        let pending = count(UnitStatus::Pending);

        Self {
            timestamp: Utc::now(),
            total: units.len(),
            running,
            unhealthy,
            stopped,
            pending,
            disabled,
            units,
        }
    }

    /// One-line summary for periodic logging
    pub fn summary(&self) -> String {
        format!(
            "{}/{} units running, {} unhealthy, {} disabled",
            self.running, self.total, self.unhealthy, self.disabled
        )
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OVERSEER STATUS")?;
        writeln!(
            f,
            "Generated: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f)?;
        writeln!(f, "Units:     {}", self.total)?;
        writeln!(f, "Running:   {}", self.running)?;
        writeln!(f, "Unhealthy: {}", self.unhealthy)?;
        writeln!(f, "Stopped:   {}", self.stopped)?;
        writeln!(f, "Pending:   {}", self.pending)?;
        writeln!(f, "Disabled:  {}", self.disabled)?;
        writeln!(f)?;

        for unit in &self.units {
            write!(
                f,
                "  {:<10} {:<24} {:<10} prio={:<4} restarts={}",
                unit.status.to_string(),
                unit.id,
                unit.kind.to_string(),
                unit.priority,
                unit.restart_count_in_window
            )?;
            if let Some(pid) = unit.pid {
                write!(f, " pid={}", pid)?;
            }
            if let Some(uptime) = unit.uptime(self.timestamp) {
                write!(f, " uptime={}s", uptime.num_seconds())?;
            }
            if !unit.auto_restart {
                write!(f, " auto-restart=off")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
