//! Behavioural properties of the migration runner, exercised against the
//! in-memory mock target.

use strata_core::discovery::discover_sql_units;
use strata_core::mock::{MockCall, MockTarget};
use strata_core::{run_target, Error, MigrationUnit, RunMode, TargetKind};

fn unit(version: u32) -> MigrationUnit<String> {
    MigrationUnit::new(
        version,
        format!("{:03}_step.sql", version),
        format!("CREATE TABLE step_{} (id INT);", version),
    )
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let target = MockTarget::new(TargetKind::Relational);
    let units = vec![unit(1), unit(2)];

    let first = run_target(&target, units.clone(), RunMode::Apply)
        .await
        .expect("first run should succeed");
    assert_eq!(first.applied_count(), 2);
    let ledger_after_first = target.ledger();

    let second = run_target(&target, units, RunMode::Apply)
        .await
        .expect("second run should succeed");

    assert_eq!(second.applied_count(), 0);
    assert_eq!(second.already_applied, 2);
    assert_eq!(target.ledger(), ledger_after_first);
    assert_eq!(target.executed_versions(), vec![1, 2]);
}

#[tokio::test]
async fn test_units_apply_in_ascending_order() {
    let target = MockTarget::new(TargetKind::Columnar);

    let report = run_target(&target, vec![unit(3), unit(1), unit(2)], RunMode::Apply)
        .await
        .unwrap();

    assert_eq!(report.versions(), vec![1, 2, 3]);
    assert_eq!(target.executed_versions(), vec![1, 2, 3]);
    assert_eq!(target.ledger_versions(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_run_stops_at_first_failure() {
    let target = MockTarget::new(TargetKind::Document).with_failure(6);

    let err = run_target(&target, vec![unit(5), unit(6), unit(7)], RunMode::Apply)
        .await
        .unwrap_err();

    assert_eq!(err.failed_version(), Some(6));
    assert_eq!(target.ledger_versions(), vec![5]);
    assert_eq!(target.executed_versions(), vec![5, 6]);
    assert!(!target.calls().contains(&MockCall::Execute(7)));
}

#[tokio::test]
async fn test_failed_version_is_retried_on_next_run() {
    let target = MockTarget::new(TargetKind::Columnar).with_failure(2);
    let units = vec![unit(1), unit(2), unit(3)];

    assert!(run_target(&target, units.clone(), RunMode::Apply)
        .await
        .is_err());
    target.clear_failures();

    let report = run_target(&target, units, RunMode::Apply).await.unwrap();
    assert_eq!(report.versions(), vec![2, 3]);
    assert_eq!(target.ledger_versions(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_transactional_target_keeps_no_partial_state() {
    let target = MockTarget::new(TargetKind::Relational)
        .transactional()
        .with_record_failure(2);

    let err = run_target(&target, vec![unit(1), unit(2)], RunMode::Apply)
        .await
        .unwrap_err();

    assert_eq!(err.failed_version(), Some(2));
    assert_eq!(target.effects(), vec![1]);
    assert_eq!(target.ledger_versions(), vec![1]);
}

#[tokio::test]
async fn test_non_transactional_target_keeps_partial_effects() {
    let target = MockTarget::new(TargetKind::Columnar).with_record_failure(2);

    let err = run_target(&target, vec![unit(1), unit(2)], RunMode::Apply)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Migration { .. }));
    assert_eq!(target.effects(), vec![1, 2]);
    assert_eq!(target.ledger_versions(), vec![1]);
}

#[tokio::test]
async fn test_ledger_entries_outside_source_are_ignored() {
    let target = MockTarget::new(TargetKind::Relational);
    target.seed_ledger(99, "099_removed.sql");

    let report = run_target(&target, vec![unit(1)], RunMode::Apply)
        .await
        .unwrap();

    assert_eq!(report.versions(), vec![1]);
    assert_eq!(report.already_applied, 0);
    assert_eq!(target.ledger_versions(), vec![99, 1]);
}

#[tokio::test]
async fn test_malformed_unit_file_is_never_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("001_init.sql"), "CREATE TABLE a (id INT);").unwrap();
    std::fs::write(dir.path().join("draft_notes.sql"), "DROP TABLE a;").unwrap();
    std::fs::write(dir.path().join("002_next.sql"), "CREATE TABLE b (id INT);").unwrap();
    std::fs::write(dir.path().join("003_readme.md"), "not a migration").unwrap();

    let units = discover_sql_units(TargetKind::Relational, dir.path())
        .await
        .unwrap();
    let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["001_init.sql", "002_next.sql"]);

    let target = MockTarget::new(TargetKind::Relational);
    let report = run_target(&target, units, RunMode::Apply).await.unwrap();
    assert_eq!(report.versions(), vec![1, 2]);
}

#[tokio::test]
async fn test_discovery_reads_unit_bodies() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("010_quotes.sql"),
        "CREATE TABLE quotes (symbol TEXT);",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("020_nested.sql")).unwrap();

    let units = discover_sql_units(TargetKind::Columnar, dir.path())
        .await
        .unwrap();

    assert_eq!(units.len(), 1);
    assert_eq!(units[0].version, 10);
    assert_eq!(units[0].body, "CREATE TABLE quotes (symbol TEXT);");
}

#[tokio::test]
async fn test_discovery_rejects_duplicate_versions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("001_a.sql"), "SELECT 1;").unwrap();
    std::fs::write(dir.path().join("1_b.sql"), "SELECT 2;").unwrap();

    let err = discover_sql_units(TargetKind::Relational, dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateVersion { version: 1, .. }));
}
