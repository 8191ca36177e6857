//! Overseer Supervisor - keeps a set of long-running units alive
//!
//! A unit is either an OS process or an in-process engine driven by a
//! [`UnitController`](overseer_core::controller::UnitController). The supervisor:
//!
//! - starts units in priority order with per-unit startup delays, and stops them in reverse
//! - probes running units on a coarse tick, honouring each unit's own `health_interval`
//! - restarts dead units within a rolling budget, then disables them for an operator
//! - stops everything exactly once on shutdown
//!
//! ## Example
//!
//! ```no_run
//! use overseer_core::config::SupervisorSettings;
//! use overseer_supervisor::{Supervisor, UnitSpec, wait_for_shutdown_signal};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let supervisor = Arc::new(Supervisor::new(SupervisorSettings::default()));
//! supervisor.register(
//!     UnitSpec::process("api", "./api-server")
//!         .with_priority(10)
//!         .with_startup_delay(Duration::from_secs(2)),
//! )?;
//!
//! supervisor.start_all().await;
//! supervisor.spawn_health_monitor();
//!
//! wait_for_shutdown_signal().await?;
//! supervisor.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod error;
mod health;
mod lifecycle;
mod registry;
mod reporter;
mod restart;
mod shutdown;
mod spec;
mod supervisor;

pub use backend::{Backends, StopOutcome, UnitBackend, UnitHandle};
pub use error::{Result, SupervisorError};
pub use health::HealthTick;
pub use lifecycle::SequenceReport;
pub use reporter::{read_status_file, write_status_file};
pub use restart::{RestartDecision, RestartWindow, evaluate};
pub use shutdown::wait_for_shutdown_signal;
pub use spec::{ControllerCatalog, EngineLaunch, Launch, ProcessLaunch, UnitSpec};
pub use supervisor::Supervisor;
