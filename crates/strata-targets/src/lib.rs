//! # strata-targets
//!
//! Store adapters for strata.
//!
//! This crate provides:
//! - [`PostgresTarget`]: transactional SQL units over a single sqlx session
//! - [`ClickHouseTarget`]: statement-by-statement SQL units over the HTTP interface
//! - [`MongoTarget`]: compiled-in [`DocumentMigration`] procedures
//! - Connectors that wire each adapter into the [`strata_core::Orchestrator`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{RunMode, Selector, Settings};
//!
//! let settings = Settings::from_env()?;
//! let report = strata_targets::orchestrator(&settings)
//!     .run(Selector::All, RunMode::Apply)
//!     .await;
//! ```

pub mod clickhouse;
pub mod connectors;
pub mod document_units;
pub mod mongo;
pub mod pool;
pub mod postgres;

pub use clickhouse::{split_statements, ClickHouseTarget};
pub use connectors::{orchestrator, ClickHouseConnector, MongoConnector, PostgresConnector};
pub use document_units::{DocumentMigration, DocumentRegistry, DocumentUnit};
pub use mongo::MongoTarget;
pub use pool::{create_pool_with_config, PoolConfig};
pub use postgres::PostgresTarget;
