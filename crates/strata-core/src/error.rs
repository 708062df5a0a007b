//! Error types for strata.

use thiserror::Error;

use crate::models::TargetKind;

/// Result type alias using strata's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for strata operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A session to the target could not be established
    #[error("Connection to {target} failed: {message}")]
    Connect { target: TargetKind, message: String },

    /// The ledger could not be created, read, or appended to
    #[error("Ledger error on {target}: {message}")]
    Ledger { target: TargetKind, message: String },

    /// A migration unit's body failed while executing
    #[error("Execution error: {0}")]
    Execution(String),

    /// Document store driver failure
    #[error("Document store error: {0}")]
    Document(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Two units in one source share a version
    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: u32,
        first: String,
        second: String,
    },

    /// A unit failed during application; the run stopped at this version
    #[error("Migration {version} ({name}) failed on {target}: {source}")]
    Migration {
        target: TargetKind,
        version: u32,
        name: String,
        source: Box<Error>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The version that stopped the run, if this is an application failure.
    pub fn failed_version(&self) -> Option<u32> {
        match self {
            Error::Migration { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Whether the error happened before a session was established.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Connect { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connect() {
        let err = Error::Connect {
            target: TargetKind::Document,
            message: "server selection timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Connection to document failed: server selection timeout"
        );
        assert!(err.is_connect());
    }

    #[test]
    fn test_error_display_duplicate_version() {
        let err = Error::DuplicateVersion {
            version: 3,
            first: "003_a.sql".to_string(),
            second: "003_b.sql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate migration version 3: 003_a.sql and 003_b.sql"
        );
    }

    #[test]
    fn test_error_display_migration_carries_source() {
        let err = Error::Migration {
            target: TargetKind::Columnar,
            version: 6,
            name: "006_rollups.sql".to_string(),
            source: Box::new(Error::Execution("syntax error".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Migration 6 (006_rollups.sql) failed on columnar: Execution error: syntax error"
        );
        assert_eq!(err.failed_version(), Some(6));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_display_ledger() {
        let err = Error::Ledger {
            target: TargetKind::Relational,
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Ledger error on relational: permission denied"
        );
        assert_eq!(err.failed_version(), None);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_from_reqwest() {
        let reqwest_err = reqwest::Client::new()
            .post("not a url")
            .build()
            .unwrap_err();
        let err: Error = reqwest_err.into();
        assert!(matches!(err, Error::Request(_)));
        assert!(err.to_string().starts_with("Request error: "));
    }
}
