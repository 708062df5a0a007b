//! The migration runner: applies pending units to one target, in order.
//!
//! ```text
//! Init -> LedgerReady -> ComputingPending -> Applying(0..n) -> Done
//!                                                   \-> Failed(version)
//! ```
//!
//! The first failing unit ends the run. Later units are never attempted, even
//! when they look independent: versions apply in strict ascending sequence
//! with no gaps.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::{MigrationUnit, RunMode, RunReport, UnitSummary};
use crate::traits::MigrationTarget;

/// Position of a runner in the application protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    LedgerReady,
    ComputingPending,
    /// Applying the pending unit at this index.
    Applying(usize),
    Done,
    /// Stopped at this version.
    Failed(u32),
}

/// Units not yet in the ledger, ascending by version.
pub fn pending_units<B>(
    units: Vec<MigrationUnit<B>>,
    applied: &BTreeSet<u32>,
) -> Vec<MigrationUnit<B>> {
    let mut pending: Vec<_> = units
        .into_iter()
        .filter(|unit| !applied.contains(&unit.version))
        .collect();
    pending.sort_by_key(|unit| unit.version);
    pending
}

/// Drives one target through the application protocol.
pub struct MigrationRunner<'a, T: MigrationTarget> {
    target: &'a T,
    state: RunState,
}

impl<'a, T: MigrationTarget> MigrationRunner<'a, T> {
    pub fn new(target: &'a T) -> Self {
        Self {
            target,
            state: RunState::Init,
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Ensure the ledger and compute the pending set.
    ///
    /// Returns the pending units and how many discovered units were already
    /// applied. Ledger errors propagate unchanged.
    async fn prepare(
        &mut self,
        units: Vec<MigrationUnit<T::Body>>,
    ) -> Result<(Vec<MigrationUnit<T::Body>>, usize)> {
        self.state = RunState::Init;
        self.target.ensure_ledger().await?;
        self.state = RunState::LedgerReady;

        let applied = self.target.applied_versions().await?;
        self.state = RunState::ComputingPending;

        let discovered = units.len();
        let pending = pending_units(units, &applied);
        let already_applied = discovered - pending.len();
        Ok((pending, already_applied))
    }

    /// Report the pending set without applying anything.
    pub async fn plan(&mut self, units: Vec<MigrationUnit<T::Body>>) -> Result<RunReport> {
        let started = Instant::now();
        let target = self.target.kind();
        let (pending, already_applied) = self.prepare(units).await?;
        self.state = RunState::Done;

        info!(
            subsystem = "runner",
            target = %target,
            op = "plan",
            pending_count = pending.len(),
            already_applied,
            "Computed pending migrations"
        );
        Ok(RunReport {
            target,
            mode: RunMode::DryRun,
            already_applied,
            units: pending.iter().map(MigrationUnit::summary).collect(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Apply every pending unit in ascending order.
    ///
    /// Stops at the first failure and returns [`Error::Migration`] carrying
    /// the failing version and the underlying error.
    pub async fn run(&mut self, units: Vec<MigrationUnit<T::Body>>) -> Result<RunReport> {
        let started = Instant::now();
        let target = self.target.kind();
        let (pending, already_applied) = self.prepare(units).await?;

        if pending.is_empty() {
            self.state = RunState::Done;
            info!(
                subsystem = "runner",
                target = %target,
                op = "run",
                already_applied,
                "No pending migrations"
            );
            return Ok(RunReport {
                target,
                mode: RunMode::Apply,
                already_applied,
                units: Vec::new(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        info!(
            subsystem = "runner",
            target = %target,
            op = "run",
            pending_count = pending.len(),
            "Found pending migrations"
        );

        let mut applied: Vec<UnitSummary> = Vec::with_capacity(pending.len());
        for (index, unit) in pending.iter().enumerate() {
            self.state = RunState::Applying(index);
            let unit_started = Instant::now();
            info!(
                subsystem = "runner",
                target = %target,
                op = "apply",
                version = unit.version,
                name = %unit.name,
                "Applying migration"
            );

            if let Err(e) = self.target.apply(unit).await {
                self.state = RunState::Failed(unit.version);
                error!(
                    subsystem = "runner",
                    target = %target,
                    op = "apply",
                    version = unit.version,
                    name = %unit.name,
                    error = %e,
                    "Migration failed, stopping run"
                );
                return Err(Error::Migration {
                    target,
                    version: unit.version,
                    name: unit.name.clone(),
                    source: Box::new(e),
                });
            }

            info!(
                subsystem = "runner",
                target = %target,
                op = "apply",
                version = unit.version,
                duration_ms = unit_started.elapsed().as_millis() as u64,
                "Migration applied"
            );
            applied.push(unit.summary());
        }

        self.state = RunState::Done;
        info!(
            subsystem = "runner",
            target = %target,
            op = "run",
            applied_count = applied.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "All migrations applied"
        );
        Ok(RunReport {
            target,
            mode: RunMode::Apply,
            already_applied,
            units: applied,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Run a target in the given mode with a fresh runner.
pub async fn run_target<T: MigrationTarget>(
    target: &T,
    units: Vec<MigrationUnit<T::Body>>,
    mode: RunMode,
) -> Result<RunReport> {
    let mut runner = MigrationRunner::new(target);
    match mode {
        RunMode::Apply => runner.run(units).await,
        RunMode::DryRun => runner.plan(units).await,
    }
}
