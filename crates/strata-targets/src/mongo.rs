//! MongoDB migration target.
//!
//! Unit procedures run directly against the database; nothing they write is
//! rolled back when a later step fails. The ledger is the `migrations`
//! collection.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, info};

use strata_core::{
    defaults, Error, MigrationTarget, MigrationUnit, MongoSettings, Result, TargetKind,
};

use crate::document_units::DocumentMigration;

fn ledger_error(e: impl std::fmt::Display) -> Error {
    Error::Ledger {
        target: TargetKind::Document,
        message: e.to_string(),
    }
}

fn connect_error(e: impl std::fmt::Display) -> Error {
    Error::Connect {
        target: TargetKind::Document,
        message: e.to_string(),
    }
}

/// Read the version out of one ledger document.
fn ledger_version(entry: &Document) -> Result<u32> {
    let raw = match entry.get("version") {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        other => {
            return Err(ledger_error(format!(
                "ledger document has no integer version: {:?}",
                other
            )))
        }
    };
    u32::try_from(raw).map_err(|_| ledger_error(format!("version {} out of range", raw)))
}

/// Migration target backed by one MongoDB client.
pub struct MongoTarget {
    client: Client,
    db: Database,
}

impl MongoTarget {
    /// Connect and ping the configured database.
    pub async fn connect(settings: &MongoSettings, timeout: Duration) -> Result<Self> {
        let start = Instant::now();

        let mut options = ClientOptions::parse(settings.uri())
            .await
            .map_err(connect_error)?;
        options.app_name = Some("strata-migrate".to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).map_err(connect_error)?;
        let db = client.database(&settings.database);

        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(connect_error)?;

        info!(
            subsystem = "mongodb",
            op = "connect",
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            duration_ms = start.elapsed().as_millis() as u64,
            "MongoDB connection established"
        );
        Ok(Self { client, db })
    }

    /// The migrated database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn ledger(&self) -> mongodb::Collection<Document> {
        self.db.collection(defaults::LEDGER_COLLECTION)
    }

    /// Release the client.
    pub async fn close(self) {
        self.client.shutdown().await;
        debug!(subsystem = "mongodb", op = "close", "MongoDB client shut down");
    }
}

#[async_trait]
impl MigrationTarget for MongoTarget {
    type Body = Arc<dyn DocumentMigration>;

    fn kind(&self) -> TargetKind {
        TargetKind::Document
    }

    async fn ensure_ledger(&self) -> Result<()> {
        let existing = self
            .db
            .list_collection_names()
            .await
            .map_err(ledger_error)?;

        if !existing.iter().any(|n| n == defaults::LEDGER_COLLECTION) {
            self.db
                .create_collection(defaults::LEDGER_COLLECTION)
                .await
                .map_err(ledger_error)?;
            debug!(
                subsystem = "mongodb",
                collection = defaults::LEDGER_COLLECTION,
                "Ledger collection created"
            );
        }
        Ok(())
    }

    async fn applied_versions(&self) -> Result<BTreeSet<u32>> {
        let entries: Vec<Document> = self
            .ledger()
            .find(doc! {})
            .await
            .map_err(ledger_error)?
            .try_collect()
            .await
            .map_err(ledger_error)?;

        entries.iter().map(ledger_version).collect()
    }

    async fn execute(&self, unit: &MigrationUnit<Arc<dyn DocumentMigration>>) -> Result<()> {
        unit.body.apply(&self.db).await
    }

    async fn record(&self, version: u32, name: &str) -> Result<()> {
        self.ledger()
            .insert_one(doc! {
                "version": i64::from(version),
                "name": name,
                "applied_at": bson::DateTime::now(),
            })
            .await
            .map_err(ledger_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_version_accepts_int32_and_int64() {
        assert_eq!(ledger_version(&doc! { "version": 3_i32 }).unwrap(), 3);
        assert_eq!(ledger_version(&doc! { "version": 12_i64 }).unwrap(), 12);
    }

    #[test]
    fn test_ledger_version_rejects_missing_or_negative() {
        assert!(ledger_version(&doc! { "name": "001_x" }).is_err());
        assert!(ledger_version(&doc! { "version": "1" }).is_err());
        assert!(ledger_version(&doc! { "version": -1_i64 }).is_err());
    }
}
