//! Runs the migration runner once per selected target.
//!
//! Targets are visited sequentially in [`TargetKind::ALL`] order and never
//! share state. A failing target is logged and the next one is still
//! attempted; the caller decides what the failures mean for the process.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::{RunMode, RunReport, Selector, TargetKind};
use crate::traits::TargetConnector;

/// Result of one target's run.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: TargetKind,
    pub result: Result<RunReport>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of one orchestrated invocation.
#[derive(Debug)]
pub struct OrchestrationReport {
    pub selector: Selector,
    pub outcomes: Vec<TargetOutcome>,
}

impl OrchestrationReport {
    /// True only when every attempted target succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    /// Targets that were attempted, in visiting order.
    pub fn attempted(&self) -> Vec<TargetKind> {
        self.outcomes.iter().map(|o| o.target).collect()
    }

    pub fn failed_targets(&self) -> Vec<TargetKind> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.target)
            .collect()
    }

    /// Units applied across all targets.
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(RunReport::applied_count)
            .sum()
    }
}

/// Registry of target connectors, keyed by store kind.
pub struct Orchestrator {
    connectors: BTreeMap<TargetKind, Arc<dyn TargetConnector>>,
}

impl Orchestrator {
    /// Create an empty orchestrator.
    pub fn new() -> Self {
        Self {
            connectors: BTreeMap::new(),
        }
    }

    /// Register a connector. Replaces any existing connector for the same kind.
    pub fn register(&mut self, connector: Arc<dyn TargetConnector>) {
        self.connectors.insert(connector.kind(), connector);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_connector(mut self, connector: Arc<dyn TargetConnector>) -> Self {
        self.register(connector);
        self
    }

    pub fn has_connector(&self, kind: TargetKind) -> bool {
        self.connectors.contains_key(&kind)
    }

    /// Migrate every target implied by the selector.
    pub async fn run(&self, selector: Selector, mode: RunMode) -> OrchestrationReport {
        let started = Instant::now();
        let mut outcomes = Vec::new();

        for kind in selector.kinds() {
            info!(
                subsystem = "orchestrator",
                target = %kind,
                store = kind.display_name(),
                "Migrating target"
            );

            let result = match self.connectors.get(&kind) {
                Some(connector) => connector.migrate(mode).await,
                None => Err(Error::Config(format!(
                    "no connector registered for {} target",
                    kind
                ))),
            };

            match &result {
                Ok(report) => info!(
                    subsystem = "orchestrator",
                    target = %kind,
                    applied_count = report.applied_count(),
                    pending_count = if mode == RunMode::DryRun { report.units.len() } else { 0 },
                    duration_ms = report.duration_ms,
                    "Target finished"
                ),
                Err(e) => error!(
                    subsystem = "orchestrator",
                    target = %kind,
                    store = kind.display_name(),
                    version = e.failed_version(),
                    error = %e,
                    "Target failed"
                ),
            }
            outcomes.push(TargetOutcome {
                target: kind,
                result,
            });
        }

        let report = OrchestrationReport { selector, outcomes };
        if report.is_success() {
            info!(
                subsystem = "orchestrator",
                selector = %selector,
                applied_count = report.applied_count(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Migrations completed successfully"
            );
        } else {
            error!(
                subsystem = "orchestrator",
                selector = %selector,
                failed_targets = ?report.failed_targets(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Migrations finished with failures"
            );
        }
        report
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockTarget};

    #[test]
    fn test_orchestrator_new_is_empty() {
        let orchestrator = Orchestrator::new();
        assert!(!orchestrator.has_connector(TargetKind::Relational));
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Arc::new(MockConnector::new(
            MockTarget::new(TargetKind::Columnar),
            Vec::new(),
        )));
        orchestrator.register(Arc::new(MockConnector::new(
            MockTarget::new(TargetKind::Columnar),
            Vec::new(),
        )));
        assert!(orchestrator.has_connector(TargetKind::Columnar));
        assert_eq!(orchestrator.connectors.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_connector_is_a_failure() {
        let orchestrator = Orchestrator::new();
        let report = orchestrator
            .run(Selector::Only(TargetKind::Document), RunMode::Apply)
            .await;

        assert!(!report.is_success());
        assert_eq!(report.failed_targets(), vec![TargetKind::Document]);
        assert!(matches!(
            report.outcomes[0].result,
            Err(Error::Config(_))
        ));
    }
}
