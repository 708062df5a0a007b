//! One [`TargetConnector`] per store.
//!
//! A connector owns the resolved settings for its store. Each `migrate` call
//! opens a fresh session, discovers units, runs them, and closes the session
//! whatever the run's outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use strata_core::discovery::discover_sql_units;
use strata_core::{
    run_target, ClickHouseSettings, MongoSettings, Orchestrator, PostgresSettings, Result,
    RunMode, RunReport, Settings, TargetConnector, TargetKind,
};

use crate::clickhouse::ClickHouseTarget;
use crate::document_units::DocumentRegistry;
use crate::mongo::MongoTarget;
use crate::postgres::PostgresTarget;

fn log_connected(kind: TargetKind) {
    info!(
        subsystem = "orchestrator",
        target = %kind,
        store = kind.display_name(),
        "Connected"
    );
}

/// Connector for the relational target.
pub struct PostgresConnector {
    settings: PostgresSettings,
    source_dir: PathBuf,
    timeout: Duration,
}

impl PostgresConnector {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.postgres.clone(),
            source_dir: settings.source_dir(TargetKind::Relational),
            timeout: settings.connect_timeout,
        }
    }
}

#[async_trait]
impl TargetConnector for PostgresConnector {
    fn kind(&self) -> TargetKind {
        TargetKind::Relational
    }

    async fn migrate(&self, mode: RunMode) -> Result<RunReport> {
        let target = PostgresTarget::connect(&self.settings, self.timeout).await?;
        log_connected(TargetKind::Relational);

        let result = async {
            let units = discover_sql_units(TargetKind::Relational, &self.source_dir).await?;
            run_target(&target, units, mode).await
        }
        .await;

        target.close().await;
        result
    }
}

/// Connector for the columnar target.
pub struct ClickHouseConnector {
    settings: ClickHouseSettings,
    source_dir: PathBuf,
    timeout: Duration,
}

impl ClickHouseConnector {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clickhouse.clone(),
            source_dir: settings.source_dir(TargetKind::Columnar),
            timeout: settings.connect_timeout,
        }
    }
}

#[async_trait]
impl TargetConnector for ClickHouseConnector {
    fn kind(&self) -> TargetKind {
        TargetKind::Columnar
    }

    async fn migrate(&self, mode: RunMode) -> Result<RunReport> {
        let target = ClickHouseTarget::connect(&self.settings, self.timeout).await?;
        log_connected(TargetKind::Columnar);

        let result = async {
            let units = discover_sql_units(TargetKind::Columnar, &self.source_dir).await?;
            run_target(&target, units, mode).await
        }
        .await;

        target.close();
        result
    }
}

/// Connector for the document target.
pub struct MongoConnector {
    settings: MongoSettings,
    registry: DocumentRegistry,
    timeout: Duration,
}

impl MongoConnector {
    /// Connector using the built-in document units.
    pub fn new(settings: &Settings) -> Self {
        Self::with_registry(settings, DocumentRegistry::builtin())
    }

    pub fn with_registry(settings: &Settings, registry: DocumentRegistry) -> Self {
        Self {
            settings: settings.mongo.clone(),
            registry,
            timeout: settings.connect_timeout,
        }
    }
}

#[async_trait]
impl TargetConnector for MongoConnector {
    fn kind(&self) -> TargetKind {
        TargetKind::Document
    }

    async fn migrate(&self, mode: RunMode) -> Result<RunReport> {
        let target = MongoTarget::connect(&self.settings, self.timeout).await?;
        log_connected(TargetKind::Document);

        let result = match self.registry.units() {
            Ok(units) => run_target(&target, units, mode).await,
            Err(e) => Err(e),
        };

        target.close().await;
        result
    }
}

/// Orchestrator with a connector registered for every store.
pub fn orchestrator(settings: &Settings) -> Orchestrator {
    Orchestrator::new()
        .with_connector(Arc::new(PostgresConnector::new(settings)))
        .with_connector(Arc::new(ClickHouseConnector::new(settings)))
        .with_connector(Arc::new(MongoConnector::new(settings)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::from_lookup(|_| None)
            .unwrap()
            .with_migrations_dir("/srv/migrations")
    }

    #[test]
    fn test_orchestrator_registers_every_store() {
        let orchestrator = orchestrator(&settings());
        for kind in TargetKind::ALL {
            assert!(orchestrator.has_connector(kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_sql_connectors_read_from_store_directories() {
        let settings = settings();
        assert_eq!(
            PostgresConnector::new(&settings).source_dir,
            PathBuf::from("/srv/migrations/postgres")
        );
        assert_eq!(
            ClickHouseConnector::new(&settings).source_dir,
            PathBuf::from("/srv/migrations/clickhouse")
        );
    }

    #[test]
    fn test_connector_kinds() {
        let settings = settings();
        assert_eq!(PostgresConnector::new(&settings).kind(), TargetKind::Relational);
        assert_eq!(ClickHouseConnector::new(&settings).kind(), TargetKind::Columnar);
        assert_eq!(MongoConnector::new(&settings).kind(), TargetKind::Document);
    }
}
