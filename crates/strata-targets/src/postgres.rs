//! PostgreSQL migration target.
//!
//! Each unit runs as one statement batch inside a transaction together with
//! its ledger row. Either both persist or neither does.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgExecutor, PgPool};
use sqlx::Executor;
use tracing::{debug, warn};

use strata_core::{
    defaults, Error, LedgerEntry, MigrationTarget, MigrationUnit, PostgresSettings, Result,
    TargetKind,
};

use crate::pool::{connect_options, create_pool_with_config, PoolConfig};

const CREATE_LEDGER_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS migration_history (
        version INTEGER PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const SELECT_VERSIONS_SQL: &str = "SELECT version FROM migration_history ORDER BY version";

const SELECT_LEDGER_SQL: &str = r#"
    SELECT version, name, COALESCE(applied_at, LOCALTIMESTAMP)
    FROM migration_history
    ORDER BY version
"#;

const INSERT_LEDGER_SQL: &str = "INSERT INTO migration_history (version, name) VALUES ($1, $2)";

/// Migration target backed by a single PostgreSQL session.
pub struct PostgresTarget {
    pool: PgPool,
}

impl PostgresTarget {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a session using resolved settings.
    pub async fn connect(settings: &PostgresSettings, timeout: Duration) -> Result<Self> {
        let pool = create_pool_with_config(
            connect_options(settings),
            PoolConfig::new().connect_timeout(timeout),
        )
        .await?;
        Ok(Self::new(pool))
    }

    /// Full ledger contents, ascending by version.
    pub async fn ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<(i32, String, NaiveDateTime)> = sqlx::query_as(SELECT_LEDGER_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.into_iter()
            .map(|(version, name, applied_at)| {
                Ok(LedgerEntry {
                    version: ledger_version(version)?,
                    name,
                    applied_at: applied_at.and_utc(),
                })
            })
            .collect()
    }

    /// Release the session.
    pub async fn close(self) {
        self.pool.close().await;
        debug!(
            subsystem = "database",
            component = "pool",
            op = "close",
            "Database connection pool closed"
        );
    }
}

fn ledger_version(raw: i32) -> Result<u32> {
    u32::try_from(raw).map_err(|_| Error::Ledger {
        target: TargetKind::Relational,
        message: format!("negative version {} in {}", raw, defaults::LEDGER_TABLE),
    })
}

async fn insert_ledger_row<'e, E>(executor: E, version: u32, name: &str) -> Result<()>
where
    E: PgExecutor<'e>,
{
    let version = i32::try_from(version).map_err(|_| Error::Ledger {
        target: TargetKind::Relational,
        message: format!("version {} does not fit an INTEGER column", version),
    })?;

    sqlx::query(INSERT_LEDGER_SQL)
        .bind(version)
        .bind(name)
        .execute(executor)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

#[async_trait]
impl MigrationTarget for PostgresTarget {
    type Body = String;

    fn kind(&self) -> TargetKind {
        TargetKind::Relational
    }

    async fn ensure_ledger(&self) -> Result<()> {
        sqlx::query(CREATE_LEDGER_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Ledger {
                target: TargetKind::Relational,
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn applied_versions(&self) -> Result<BTreeSet<u32>> {
        let versions: Vec<i32> = sqlx::query_scalar(SELECT_VERSIONS_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Ledger {
                target: TargetKind::Relational,
                message: e.to_string(),
            })?;

        versions.into_iter().map(ledger_version).collect()
    }

    async fn execute(&self, unit: &MigrationUnit<String>) -> Result<()> {
        sqlx::raw_sql(&unit.body)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn record(&self, version: u32, name: &str) -> Result<()> {
        insert_ledger_row(&self.pool, version, name).await
    }

    async fn apply(&self, unit: &MigrationUnit<String>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let outcome = async {
            (&mut *tx)
                .execute(sqlx::raw_sql(&unit.body))
                .await
                .map_err(Error::Database)?;
            insert_ledger_row(&mut *tx, unit.version, &unit.name).await
        }
        .await;

        match outcome {
            Ok(()) => {
                tx.commit().await.map_err(Error::Database)?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        subsystem = "database",
                        target = %TargetKind::Relational,
                        version = unit.version,
                        error = %rollback_err,
                        "Rollback failed after migration error"
                    );
                }
                Err(e)
            }
        }
    }
}
