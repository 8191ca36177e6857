//! # Overseer Core
//!
//! Shared building blocks for the Overseer unit supervisor:
//! - Unit kinds, lifecycle status and read-only status snapshots
//! - The contract in-process units ("engines") implement
//! - Layered configuration loading (defaults, `overseer.toml`, environment)
//!
//! The supervision logic itself lives in `overseer-supervisor`.
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use overseer_core::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = OverseerConfig::load()?;
//!     for unit in config.startup_order() {
//!         println!("{} (priority {})", unit.id, unit.priority);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod unit;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LaunchConfig, OverseerConfig, SupervisorSettings, UnitConfig};
    pub use crate::controller::{ControllerFactory, UnitController};
    pub use crate::error::{OverseerError, Result};
    pub use crate::unit::{SystemStatus, UnitKind, UnitSnapshot, UnitStatus};
}
