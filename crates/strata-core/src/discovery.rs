//! Discovery of migration units.
//!
//! A unit's version is the integer token at the start of its name, ending at
//! the first `_` of the file stem: `001_create_quotes.sql` is version 1.
//! Names without such a token are skipped with a warning and never applied.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{MigrationUnit, TargetKind};

/// Extension of unit files for SQL targets.
pub const SQL_EXTENSION: &str = "sql";

/// Parse the leading version token of a unit name.
///
/// Returns `None` when the token is empty, contains anything but ASCII
/// digits, or does not fit in a `u32`.
pub fn parse_version(name: &str) -> Option<u32> {
    let stem = Path::new(name).file_stem()?.to_str()?;
    let token = stem.split('_').next()?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Build an ordered unit set from named candidates.
///
/// Candidates whose names do not parse are logged and dropped.
pub fn collect_units<B, I>(target: TargetKind, candidates: I) -> Result<Vec<MigrationUnit<B>>>
where
    I: IntoIterator<Item = (String, B)>,
{
    let mut units = Vec::new();
    for (name, body) in candidates {
        match parse_version(&name) {
            Some(version) => units.push(MigrationUnit::new(version, name, body)),
            None => warn!(
                subsystem = "discovery",
                target = %target,
                name = %name,
                "Skipping migration unit without a numeric version prefix"
            ),
        }
    }
    order_units(units)
}

/// Sort units ascending by version and reject duplicate versions.
pub fn order_units<B>(mut units: Vec<MigrationUnit<B>>) -> Result<Vec<MigrationUnit<B>>> {
    units.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)));

    if let Some(pair) = units.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(Error::DuplicateVersion {
            version: pair[0].version,
            first: pair[0].name.clone(),
            second: pair[1].name.clone(),
        });
    }
    Ok(units)
}

/// Discover `.sql` units in a target's source directory.
///
/// A missing directory yields an empty set. Hidden files, sub-directories,
/// and files with other extensions are ignored silently.
pub async fn discover_sql_units(
    target: TargetKind,
    dir: &Path,
) -> Result<Vec<MigrationUnit<String>>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                subsystem = "discovery",
                target = %target,
                dir = %dir.display(),
                "Migration directory not found, nothing to apply"
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(SQL_EXTENSION) {
            continue;
        }
        if !tokio::fs::metadata(&path).await?.is_file() {
            continue;
        }
        candidates.push((name, path));
    }
    // read_dir order is platform-dependent; keep warnings deterministic
    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let located = collect_units(target, candidates)?;
    let mut units = Vec::with_capacity(located.len());
    for unit in located {
        let body = tokio::fs::read_to_string(&unit.body).await?;
        units.push(MigrationUnit::new(unit.version, unit.name, body));
    }

    debug!(
        subsystem = "discovery",
        target = %target,
        dir = %dir.display(),
        unit_count = units.len(),
        "Discovered migration units"
    );
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_with_separator() {
        assert_eq!(parse_version("001_create_quotes.sql"), Some(1));
        assert_eq!(parse_version("42_add_index.sql"), Some(42));
        assert_eq!(parse_version("001_collections_schema"), Some(1));
    }

    #[test]
    fn test_parse_version_without_description() {
        assert_eq!(parse_version("7.sql"), Some(7));
    }

    #[test]
    fn test_parse_version_rejects_malformed_names() {
        assert_eq!(parse_version("draft_notes.sql"), None);
        assert_eq!(parse_version("12abc_oops.sql"), None);
        assert_eq!(parse_version("_001.sql"), None);
        assert_eq!(parse_version("v1_init.sql"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_parse_version_rejects_overflow() {
        assert_eq!(parse_version("99999999999_big.sql"), None);
    }

    #[test]
    fn test_collect_units_orders_and_skips() {
        let units = collect_units(
            TargetKind::Relational,
            vec![
                ("003_c.sql".to_string(), "c"),
                ("draft_notes.sql".to_string(), "draft"),
                ("001_a.sql".to_string(), "a"),
                ("002_b.sql".to_string(), "b"),
            ],
        )
        .unwrap();

        let versions: Vec<u32> = units.iter().map(|u| u.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(units.iter().all(|u| u.body != "draft"));
    }

    #[test]
    fn test_order_units_rejects_duplicates() {
        let err = order_units(vec![
            MigrationUnit::new(2, "002_b.sql", ()),
            MigrationUnit::new(1, "001_a.sql", ()),
            MigrationUnit::new(2, "002_also_b.sql", ()),
        ])
        .unwrap_err();

        match err {
            Error::DuplicateVersion {
                version,
                first,
                second,
            } => {
                assert_eq!(version, 2);
                assert_eq!(first, "002_also_b.sql");
                assert_eq!(second, "002_b.sql");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_discover_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let units = discover_sql_units(TargetKind::Relational, &dir.path().join("postgres"))
            .await
            .unwrap();
        assert!(units.is_empty());
    }
}
