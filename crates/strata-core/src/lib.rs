//! # strata-core
//!
//! Core types, traits, and the migration protocol for strata.
//!
//! This crate provides:
//! - Discovery of versioned migration units from a source directory
//! - The [`MigrationTarget`] capability trait implemented once per store kind
//! - The [`MigrationRunner`] that applies pending units in ascending order
//! - The [`Orchestrator`] that runs every selected target independently
//! - Configuration resolution from an env file plus the process environment
//!
//! Store adapters live in `strata-targets`; this crate never talks to a
//! database driver directly.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{discovery, run_target, RunMode, TargetKind};
//!
//! let units = discovery::discover_sql_units(TargetKind::Relational, dir).await?;
//! let report = run_target(&target, units, RunMode::Apply).await?;
//! println!("applied {} migrations", report.applied_count());
//! ```

pub mod config;
pub mod defaults;
pub mod discovery;
pub mod error;
pub mod mock;
pub mod models;
pub mod orchestrator;
pub mod runner;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{
    ClickHouseSettings, ConfigError, ConfigResult, MongoSettings, PostgresSettings, Settings,
};
pub use error::{Error, Result};
pub use models::*;
pub use orchestrator::{OrchestrationReport, Orchestrator, TargetOutcome};
pub use runner::{pending_units, run_target, MigrationRunner, RunState};
pub use traits::{MigrationTarget, TargetConnector};
