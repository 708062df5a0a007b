//! In-memory targets for deterministic testing.
//!
//! [`MockTarget`] keeps its ledger in memory, logs every call, and can be
//! told to fail on specific versions. [`MockConnector`] wraps a mock target
//! behind the [`TargetConnector`] seam and can simulate connect failures.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use strata_core::mock::MockTarget;
//! use strata_core::{run_target, MigrationUnit, RunMode, TargetKind};
//!
//! let target = MockTarget::new(TargetKind::Columnar).with_failure(2);
//! let units = vec![
//!     MigrationUnit::new(1, "001_a.sql", String::new()),
//!     MigrationUnit::new(2, "002_b.sql", String::new()),
//! ];
//! assert!(run_target(&target, units, RunMode::Apply).await.is_err());
//! assert_eq!(target.ledger_versions(), vec![1]);
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{LedgerEntry, MigrationUnit, RunMode, RunReport, TargetKind};
use crate::runner::run_target;
use crate::traits::{MigrationTarget, TargetConnector};

/// One call made against a mock target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    EnsureLedger,
    AppliedVersions,
    Execute(u32),
    Record(u32),
}

#[derive(Debug, Default)]
struct MockState {
    ledger: Vec<LedgerEntry>,
    /// Versions whose side effects are currently visible.
    effects: Vec<u32>,
    calls: Vec<MockCall>,
    failing_versions: BTreeSet<u32>,
    failing_records: BTreeSet<u32>,
    fail_ensure: bool,
    transactional: bool,
}

/// Mock migration target backed by memory.
#[derive(Clone)]
pub struct MockTarget {
    kind: TargetKind,
    state: Arc<Mutex<MockState>>,
}

impl MockTarget {
    /// Create a mock target with an empty ledger.
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Fail when executing this version.
    pub fn with_failure(self, version: u32) -> Self {
        self.lock().failing_versions.insert(version);
        self
    }

    /// Fail when recording this version in the ledger.
    pub fn with_record_failure(self, version: u32) -> Self {
        self.lock().failing_records.insert(version);
        self
    }

    /// Fail when creating the ledger.
    pub fn with_ensure_failure(self) -> Self {
        self.lock().fail_ensure = true;
        self
    }

    /// Commit execution and ledger entry together, discarding effects on failure.
    pub fn transactional(self) -> Self {
        self.lock().transactional = true;
        self
    }

    /// Stop failing on every configured version.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_versions.clear();
        state.failing_records.clear();
        state.fail_ensure = false;
    }

    /// Insert a ledger entry as if a previous run had applied it.
    pub fn seed_ledger(&self, version: u32, name: &str) {
        self.lock().ledger.push(LedgerEntry {
            version,
            name: name.to_string(),
            applied_at: Utc::now(),
        });
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.lock().ledger.clone()
    }

    pub fn ledger_versions(&self) -> Vec<u32> {
        self.lock().ledger.iter().map(|e| e.version).collect()
    }

    /// Versions passed to `execute`, in call order.
    pub fn executed_versions(&self) -> Vec<u32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Execute(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Versions whose side effects persist in the store.
    pub fn effects(&self) -> Vec<u32> {
        self.lock().effects.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn execute_locked(&self, state: &mut MockState, version: u32) -> Result<()> {
        state.calls.push(MockCall::Execute(version));
        if state.failing_versions.contains(&version) {
            return Err(Error::Execution(format!(
                "mock {} failure at version {}",
                self.kind, version
            )));
        }
        state.effects.push(version);
        Ok(())
    }

    fn record_locked(&self, state: &mut MockState, version: u32, name: &str) -> Result<()> {
        state.calls.push(MockCall::Record(version));
        if state.failing_records.contains(&version) {
            return Err(Error::Ledger {
                target: self.kind,
                message: format!("mock ledger write failure at version {}", version),
            });
        }
        state.ledger.push(LedgerEntry {
            version,
            name: name.to_string(),
            applied_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl MigrationTarget for MockTarget {
    type Body = String;

    fn kind(&self) -> TargetKind {
        self.kind
    }

    async fn ensure_ledger(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::EnsureLedger);
        if state.fail_ensure {
            return Err(Error::Ledger {
                target: self.kind,
                message: "mock ledger creation failure".to_string(),
            });
        }
        Ok(())
    }

    async fn applied_versions(&self) -> Result<BTreeSet<u32>> {
        let mut state = self.lock();
        state.calls.push(MockCall::AppliedVersions);
        Ok(state.ledger.iter().map(|e| e.version).collect())
    }

    async fn execute(&self, unit: &MigrationUnit<String>) -> Result<()> {
        let mut state = self.lock();
        self.execute_locked(&mut state, unit.version)
    }

    async fn record(&self, version: u32, name: &str) -> Result<()> {
        let mut state = self.lock();
        self.record_locked(&mut state, version, name)
    }

    async fn apply(&self, unit: &MigrationUnit<String>) -> Result<()> {
        let mut state = self.lock();
        if !state.transactional {
            self.execute_locked(&mut state, unit.version)?;
            return self.record_locked(&mut state, unit.version, &unit.name);
        }

        let effects_before = state.effects.len();
        let outcome = self
            .execute_locked(&mut state, unit.version)
            .and_then(|_| self.record_locked(&mut state, unit.version, &unit.name));
        if outcome.is_err() {
            state.effects.truncate(effects_before);
        }
        outcome
    }
}

/// Mock connector that hands a [`MockTarget`] to the runner.
#[derive(Clone)]
pub struct MockConnector {
    target: MockTarget,
    units: Vec<MigrationUnit<String>>,
    fail_connect: bool,
    connects: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(target: MockTarget, units: Vec<MigrationUnit<String>>) -> Self {
        Self {
            target,
            units,
            fail_connect: false,
            connects: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuse every connection attempt.
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn target(&self) -> &MockTarget {
        &self.target
    }

    /// Number of connection attempts made.
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions released after a successful connect.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetConnector for MockConnector {
    fn kind(&self) -> TargetKind {
        self.target.kind
    }

    async fn migrate(&self, mode: RunMode) -> Result<RunReport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(Error::Connect {
                target: self.target.kind,
                message: "mock connection refused".to_string(),
            });
        }

        let result = run_target(&self.target, self.units.clone(), mode).await;
        self.releases.fetch_add(1, Ordering::SeqCst);
        result
    }
}
