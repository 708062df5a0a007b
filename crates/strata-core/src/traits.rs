//! Capability traits implemented once per store kind.
//!
//! The runner depends only on [`MigrationTarget`]; the orchestrator depends
//! only on [`TargetConnector`]. Neither ever branches on the store kind.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MigrationUnit, RunMode, RunReport, TargetKind};

/// A connected store that can hold a ledger and execute migration units.
#[async_trait]
pub trait MigrationTarget: Send + Sync {
    /// Unit body this target knows how to execute.
    type Body: Send + Sync;

    /// The store kind this target migrates.
    fn kind(&self) -> TargetKind;

    /// Create the ledger structure if it does not exist yet.
    ///
    /// Called at the start of every run, so it must be idempotent.
    async fn ensure_ledger(&self) -> Result<()>;

    /// All versions currently recorded in the ledger.
    async fn applied_versions(&self) -> Result<BTreeSet<u32>>;

    /// Run the unit's side effects against the store.
    async fn execute(&self, unit: &MigrationUnit<Self::Body>) -> Result<()>;

    /// Append one ledger entry.
    async fn record(&self, version: u32, name: &str) -> Result<()>;

    /// Execute a unit and record it.
    ///
    /// Targets that can commit both in one transaction override this.
    async fn apply(&self, unit: &MigrationUnit<Self::Body>) -> Result<()> {
        self.execute(unit).await?;
        self.record(unit.version, &unit.name).await
    }
}

/// Owns everything needed to migrate one target end to end.
///
/// Implementations connect, discover units, run the migration runner, and
/// release the session on every exit path.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    /// The store kind this connector migrates.
    fn kind(&self) -> TargetKind;

    /// Connect and run the target's migrations in the given mode.
    async fn migrate(&self, mode: RunMode) -> Result<RunReport>;
}
