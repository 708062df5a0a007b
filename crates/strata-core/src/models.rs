//! Data model shared by the runner, the orchestrator, and the store adapters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the three independently migrated stores.
///
/// Ordering follows the order targets are visited by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Relational,
    Columnar,
    Document,
}

impl TargetKind {
    /// Every target kind, in visiting order.
    pub const ALL: [TargetKind; 3] = [
        TargetKind::Relational,
        TargetKind::Columnar,
        TargetKind::Document,
    ];

    /// Name of the concrete store backing this kind.
    ///
    /// Doubles as the name of the per-target source directory.
    pub fn store_name(&self) -> &'static str {
        match self {
            Self::Relational => "postgres",
            Self::Columnar => "clickhouse",
            Self::Document => "mongodb",
        }
    }

    /// Human-readable store name for log output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Relational => "PostgreSQL",
            Self::Columnar => "ClickHouse",
            Self::Document => "MongoDB",
        }
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relational" | "postgres" | "postgresql" => Ok(Self::Relational),
            "columnar" | "clickhouse" => Ok(Self::Columnar),
            "document" | "mongodb" | "mongo" => Ok(Self::Document),
            _ => Err(Error::InvalidInput(format!("unknown target: {}", s))),
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::Columnar => write!(f, "columnar"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Which targets a single invocation migrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selector {
    #[default]
    All,
    Only(TargetKind),
}

impl Selector {
    /// Targets implied by this selector, in visiting order.
    pub fn kinds(&self) -> Vec<TargetKind> {
        match self {
            Self::All => TargetKind::ALL.to_vec(),
            Self::Only(kind) => vec![*kind],
        }
    }

    /// True when exactly one target was named; its failure is fatal.
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Only(_))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Only(kind) => write!(f, "{}", kind),
        }
    }
}

/// A discrete, versioned change definition.
///
/// `B` is the unit body: statement text for SQL targets, a registered
/// procedure for the document target.
#[derive(Debug, Clone)]
pub struct MigrationUnit<B> {
    pub version: u32,
    pub name: String,
    pub body: B,
}

impl<B> MigrationUnit<B> {
    pub fn new(version: u32, name: impl Into<String>, body: B) -> Self {
        Self {
            version,
            name: name.into(),
            body,
        }
    }

    /// Identity of this unit without its body.
    pub fn summary(&self) -> UnitSummary {
        UnitSummary {
            version: self.version,
            name: self.name.clone(),
        }
    }
}

/// Version and name of a unit, as reported and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub version: u32,
    pub name: String,
}

/// One persisted record of a successfully applied unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Whether a run applies pending units or only reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Apply,
    DryRun,
}

/// Terminal summary of one target's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub target: TargetKind,
    pub mode: RunMode,
    /// Discovered units already present in the ledger.
    pub already_applied: usize,
    /// Units applied in this run, or the pending set for a dry run.
    pub units: Vec<UnitSummary>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Number of units whose side effects were committed by this run.
    pub fn applied_count(&self) -> usize {
        match self.mode {
            RunMode::Apply => self.units.len(),
            RunMode::DryRun => 0,
        }
    }

    pub fn versions(&self) -> Vec<u32> {
        self.units.iter().map(|u| u.version).collect()
    }
}
