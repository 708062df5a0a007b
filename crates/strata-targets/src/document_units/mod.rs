//! Compiled-in migration units for the document target.
//!
//! Every unit is a type implementing [`DocumentMigration`]. Its name carries
//! the version prefix just like a SQL file name does, so ordering and
//! duplicate detection follow the same rules as the SQL targets.
//!
//! To add a unit, create a module here and register it in
//! [`DocumentRegistry::builtin`].

mod m001_collections_schema;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::Database;

use strata_core::discovery::collect_units;
use strata_core::{MigrationUnit, Result, TargetKind};

pub use m001_collections_schema::CollectionsSchema;

/// A procedure applied to the document database.
#[async_trait]
pub trait DocumentMigration: Send + Sync {
    /// Unit name, starting with its numeric version (`001_collections_schema`).
    fn name(&self) -> &'static str;

    /// Apply the unit's changes. Writes already performed are not undone on
    /// failure.
    async fn apply(&self, db: &Database) -> Result<()>;
}

impl fmt::Debug for dyn DocumentMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DocumentMigration").field(&self.name()).finish()
    }
}

/// Body of a document-target migration unit.
pub type DocumentUnit = MigrationUnit<Arc<dyn DocumentMigration>>;

/// Registry of document migrations.
#[derive(Default)]
pub struct DocumentRegistry {
    migrations: Vec<Arc<dyn DocumentMigration>>,
}

impl DocumentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every unit shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CollectionsSchema));
        registry
    }

    /// Register a migration.
    pub fn register(&mut self, migration: Arc<dyn DocumentMigration>) {
        self.migrations.push(migration);
    }

    /// Registered migrations as ordered units.
    ///
    /// Names without a version prefix are skipped; duplicate versions are an
    /// error.
    pub fn units(&self) -> Result<Vec<DocumentUnit>> {
        collect_units(
            TargetKind::Document,
            self.migrations
                .iter()
                .map(|m| (m.name().to_string(), Arc::clone(m))),
        )
    }
}
