//! ClickHouse migration target over the HTTP interface.
//!
//! ClickHouse has no multi-statement transactions. A unit's statements run
//! one request at a time, and a failure part way through leaves the earlier
//! statements applied with no ledger entry.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use strata_core::{
    ClickHouseSettings, Error, MigrationTarget, MigrationUnit, Result, TargetKind,
};

const CREATE_LEDGER_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS migration_history (
        version UInt32,
        name String,
        applied_at DateTime DEFAULT now()
    ) ENGINE = MergeTree()
    ORDER BY version
"#;

const SELECT_VERSIONS_SQL: &str =
    "SELECT version FROM migration_history ORDER BY version FORMAT JSONEachRow";

const INSERT_LEDGER_SQL: &str = "INSERT INTO migration_history (version, name) FORMAT JSONEachRow";

#[derive(Debug, Deserialize)]
struct VersionRow {
    version: u32,
}

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    version: u32,
    name: &'a str,
}

/// Split a statement batch on `;`, dropping empty fragments.
///
/// Semicolons inside string literals are not recognised.
pub fn split_statements(body: &str) -> Vec<&str> {
    body.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_version_rows(body: &str) -> Result<BTreeSet<u32>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<VersionRow>(line)
                .map(|row| row.version)
                .map_err(|e| Error::Ledger {
                    target: TargetKind::Columnar,
                    message: format!("unreadable ledger row {:?}: {}", line, e),
                })
        })
        .collect()
}

/// Migration target backed by the ClickHouse HTTP interface.
pub struct ClickHouseTarget {
    client: Client,
    settings: ClickHouseSettings,
}

impl ClickHouseTarget {
    /// Build a client and verify the server answers before returning.
    pub async fn connect(settings: &ClickHouseSettings, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Connect {
                target: TargetKind::Columnar,
                message: e.to_string(),
            })?;

        let target = Self {
            client,
            settings: settings.clone(),
        };

        target
            .query("SELECT 1")
            .await
            .map_err(|e| Error::Connect {
                target: TargetKind::Columnar,
                message: e.to_string(),
            })?;

        info!(
            subsystem = "clickhouse",
            op = "connect",
            endpoint = %target.settings.endpoint(),
            database = %target.settings.database,
            duration_ms = start.elapsed().as_millis() as u64,
            "ClickHouse connection established"
        );
        Ok(target)
    }

    /// Send one statement and return the response body.
    async fn query(&self, sql: &str) -> Result<String> {
        let response = self
            .client
            .post(self.settings.endpoint())
            .header("X-ClickHouse-User", &self.settings.user)
            .header("X-ClickHouse-Key", &self.settings.password)
            .header("X-ClickHouse-Database", &self.settings.database)
            .body(sql.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Execution(format!(
                "ClickHouse returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(response.text().await?)
    }

    /// Release the client.
    pub fn close(self) {
        debug!(subsystem = "clickhouse", op = "close", "ClickHouse client released");
    }
}

#[async_trait]
impl MigrationTarget for ClickHouseTarget {
    type Body = String;

    fn kind(&self) -> TargetKind {
        TargetKind::Columnar
    }

    async fn ensure_ledger(&self) -> Result<()> {
        self.query(CREATE_LEDGER_SQL)
            .await
            .map_err(|e| Error::Ledger {
                target: TargetKind::Columnar,
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn applied_versions(&self) -> Result<BTreeSet<u32>> {
        let body = self
            .query(SELECT_VERSIONS_SQL)
            .await
            .map_err(|e| Error::Ledger {
                target: TargetKind::Columnar,
                message: e.to_string(),
            })?;
        parse_version_rows(&body)
    }

    async fn execute(&self, unit: &MigrationUnit<String>) -> Result<()> {
        let statements = split_statements(&unit.body);
        let total = statements.len();
        for (index, statement) in statements.into_iter().enumerate() {
            debug!(
                subsystem = "clickhouse",
                version = unit.version,
                statement = index + 1,
                total,
                "Executing statement"
            );
            self.query(statement).await?;
        }
        Ok(())
    }

    async fn record(&self, version: u32, name: &str) -> Result<()> {
        let row = serde_json::to_string(&LedgerRow { version, name })?;
        self.query(&format!("{}\n{}", INSERT_LEDGER_SQL, row))
            .await
            .map_err(|e| Error::Ledger {
                target: TargetKind::Columnar,
                message: e.to_string(),
            })?;
        Ok(())
    }
}
