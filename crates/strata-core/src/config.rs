//! Configuration resolution.
//!
//! Configuration is resolved exactly once at process start:
//!
//! 1. An env file (default `docker/env.local`) is loaded with `dotenvy`.
//!    Variables already present in the process environment always win.
//! 2. Connection parameters are read from the environment, falling back to
//!    the constants in [`crate::defaults`].
//!
//! The resulting [`Settings`] is immutable and handed to each target's
//! constructor; nothing reads the environment mid-run.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use strata_core::config::{load_env_file, Settings};
//!
//! load_env_file(Path::new("docker/env.local")).expect("unreadable env file");
//! let settings = Settings::from_env().expect("invalid configuration");
//! println!("{}", settings.clickhouse.endpoint());
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::defaults;
use crate::models::TargetKind;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// PostgreSQL connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// ClickHouse HTTP interface parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ClickHouseSettings {
    pub host: String,
    pub http_port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ClickHouseSettings {
    /// Base URL of the HTTP interface.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.http_port)
    }
}

impl fmt::Debug for ClickHouseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickHouseSettings")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// MongoDB connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl MongoSettings {
    /// Connection string for the driver.
    ///
    /// Credentials are only embedded when both user and password are set, in
    /// which case authentication happens against the `admin` database.
    pub fn uri(&self) -> String {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!(
                "mongodb://{}:{}@{}:{}/{}?authSource={}",
                urlencoding::encode(user),
                urlencoding::encode(password),
                self.host,
                self.port,
                self.database,
                defaults::MONGO_AUTH_SOURCE
            ),
            _ => format!("mongodb://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

impl fmt::Debug for MongoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// Fully resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub postgres: PostgresSettings,
    pub clickhouse: ClickHouseSettings,
    pub mongo: MongoSettings,
    /// Root holding `postgres/` and `clickhouse/` unit directories.
    pub migrations_dir: PathBuf,
    pub connect_timeout: Duration,
}

impl Settings {
    /// Resolve from the process environment only.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());
        let optional = |var: &str| lookup(var).filter(|v| !v.is_empty());

        let postgres = PostgresSettings {
            host: string("POSTGRES_HOST", defaults::POSTGRES_HOST),
            port: parse_var(&lookup, "POSTGRES_PORT", defaults::POSTGRES_PORT)?,
            database: string("POSTGRES_DB", defaults::POSTGRES_DB),
            user: string("POSTGRES_USER", defaults::POSTGRES_USER),
            password: string("POSTGRES_PASSWORD", defaults::POSTGRES_PASSWORD),
        };

        let clickhouse = ClickHouseSettings {
            host: string("CLICKHOUSE_HOST", defaults::CLICKHOUSE_HOST),
            http_port: parse_var(
                &lookup,
                "CLICKHOUSE_HTTP_PORT",
                defaults::CLICKHOUSE_HTTP_PORT,
            )?,
            database: string("CLICKHOUSE_DB", defaults::CLICKHOUSE_DB),
            user: string("CLICKHOUSE_USER", defaults::CLICKHOUSE_USER),
            password: string("CLICKHOUSE_PASSWORD", defaults::CLICKHOUSE_PASSWORD),
        };

        let mongo = MongoSettings {
            host: string("MONGO_HOST", defaults::MONGO_HOST),
            port: parse_var(&lookup, "MONGO_PORT", defaults::MONGO_PORT)?,
            user: optional("MONGO_USER"),
            password: optional("MONGO_PASSWORD"),
            database: string("MONGO_DATABASE", defaults::MONGO_DATABASE),
        };

        let migrations_dir = PathBuf::from(string("STRATA_MIGRATIONS_DIR", defaults::MIGRATIONS_DIR));
        let connect_timeout = Duration::from_secs(parse_var(
            &lookup,
            "STRATA_CONNECT_TIMEOUT_SECS",
            defaults::CONNECT_TIMEOUT_SECS,
        )?);

        let settings = Self {
            postgres,
            clickhouse,
            mongo,
            migrations_dir,
            connect_timeout,
        };
        debug!(
            subsystem = "config",
            op = "resolve",
            settings = ?settings,
            "Configuration resolved"
        );
        Ok(settings)
    }

    /// Replace the migrations root (used by the `--migrations-dir` flag).
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Directory holding the SQL units for a target.
    pub fn source_dir(&self, kind: TargetKind) -> PathBuf {
        self.migrations_dir.join(kind.store_name())
    }
}

/// Load variables from an env file without overriding the process environment.
///
/// Returns whether a file was found. A missing file is not an error. Callers
/// log the outcome; this usually runs before a subscriber is installed.
pub fn load_env_file(path: &Path) -> ConfigResult<bool> {
    if !path.exists() {
        return Ok(false);
    }

    dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
