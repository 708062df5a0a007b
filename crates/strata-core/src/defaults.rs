//! Centralized default constants for strata.
//!
//! Every environment variable the process reads has its fallback here, so the
//! documented defaults and the resolved configuration cannot drift apart.

// =============================================================================
// CONFIGURATION FILE
// =============================================================================

/// Env file loaded before the process environment is read.
pub const ENV_FILE: &str = "docker/env.local";

/// Root directory holding one sub-directory of units per SQL target.
pub const MIGRATIONS_DIR: &str = "migrations";

/// Seconds to wait for a target session before giving up.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Tracing filter used when `RUST_LOG` is unset.
pub const LOG_FILTER: &str = "strata_core=info,strata_targets=info,strata_migrate=info";

// =============================================================================
// POSTGRESQL
// =============================================================================

pub const POSTGRES_HOST: &str = "localhost";
pub const POSTGRES_PORT: u16 = 5432;
pub const POSTGRES_DB: &str = "trading";
pub const POSTGRES_USER: &str = "postgres";
pub const POSTGRES_PASSWORD: &str = "postgres";

// =============================================================================
// CLICKHOUSE
// =============================================================================

pub const CLICKHOUSE_HOST: &str = "localhost";

/// HTTP interface port (the native TCP protocol is not used).
pub const CLICKHOUSE_HTTP_PORT: u16 = 8123;
pub const CLICKHOUSE_DB: &str = "default";
pub const CLICKHOUSE_USER: &str = "default";
pub const CLICKHOUSE_PASSWORD: &str = "";

// =============================================================================
// MONGODB
// =============================================================================

pub const MONGO_HOST: &str = "localhost";
pub const MONGO_PORT: u16 = 27017;
pub const MONGO_DATABASE: &str = "trading_meta";

/// Authentication database used when credentials are configured.
pub const MONGO_AUTH_SOURCE: &str = "admin";

// =============================================================================
// LEDGER
// =============================================================================

/// Ledger table name for SQL targets.
pub const LEDGER_TABLE: &str = "migration_history";

/// Ledger collection name for the document target.
pub const LEDGER_COLLECTION: &str = "migrations";
