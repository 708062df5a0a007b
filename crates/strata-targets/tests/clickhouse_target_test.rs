//! ClickHouse target against a mock HTTP interface: the exact statements
//! sent, in order, and what reaches the ledger.

use std::time::Duration;

use strata_core::{run_target, Error, MigrationUnit, RunMode, Settings};
use strata_targets::ClickHouseTarget;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(mock_server: &MockServer) -> Settings {
    let port = mock_server.address().port().to_string();
    Settings::from_lookup(|key| match key {
        "CLICKHOUSE_HOST" => Some("127.0.0.1".to_string()),
        "CLICKHOUSE_HTTP_PORT" => Some(port.clone()),
        "CLICKHOUSE_USER" => Some("migrator".to_string()),
        "CLICKHOUSE_PASSWORD" => Some("ch-secret".to_string()),
        "CLICKHOUSE_DB" => Some("analytics".to_string()),
        _ => None,
    })
    .expect("valid settings")
}

async fn connect(mock_server: &MockServer) -> ClickHouseTarget {
    let settings = settings_for(mock_server);
    ClickHouseTarget::connect(&settings.clickhouse, Duration::from_secs(5))
        .await
        .expect("mock server should answer SELECT 1")
}

/// Request bodies in the order the server received them.
async fn sent_bodies(mock_server: &MockServer) -> Vec<String> {
    mock_server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .map(|request| String::from_utf8_lossy(&request.body).trim().to_string())
        .collect()
}

#[tokio::test]
async fn test_failing_statement_stops_unit_without_ledger_row() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("BROKEN"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Code: 62. Syntax error"))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("SELECT version FROM migration_history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"version\":1}\n"))
        .with_priority(2)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let target = connect(&mock_server).await;
    let units = vec![
        MigrationUnit::new(
            1,
            "001_a.sql",
            "CREATE TABLE a (x UInt8) ENGINE = Memory;".to_string(),
        ),
        MigrationUnit::new(
            2,
            "002_b.sql",
            "CREATE TABLE b (x UInt8) ENGINE = Memory;\nBROKEN;\nCREATE TABLE c (y UInt8) ENGINE = Memory;"
                .to_string(),
        ),
        MigrationUnit::new(
            3,
            "003_d.sql",
            "CREATE TABLE d (z UInt8) ENGINE = Memory;".to_string(),
        ),
    ];

    let err = run_target(&target, units, RunMode::Apply)
        .await
        .unwrap_err();

    assert_eq!(err.failed_version(), Some(2));
    match &err {
        Error::Migration { name, source, .. } => {
            assert_eq!(name, "002_b.sql");
            assert!(matches!(**source, Error::Execution(_)), "unexpected source: {}", source);
            assert!(source.to_string().contains("500"));
        }
        other => panic!("expected a migration error, got {}", other),
    }

    let bodies = sent_bodies(&mock_server).await;
    assert_eq!(bodies.len(), 5, "unexpected requests: {:#?}", bodies);
    assert_eq!(bodies[0], "SELECT 1");
    assert!(bodies[1].starts_with("CREATE TABLE IF NOT EXISTS migration_history"));
    assert!(bodies[2].starts_with("SELECT version FROM migration_history"));
    assert_eq!(bodies[3], "CREATE TABLE b (x UInt8) ENGINE = Memory");
    assert_eq!(bodies[4], "BROKEN");

    assert!(bodies.iter().all(|b| !b.contains("INSERT INTO migration_history")));
    assert!(bodies.iter().all(|b| !b.contains("CREATE TABLE c")));
    assert!(bodies.iter().all(|b| !b.contains("CREATE TABLE d")));

    target.close();
}

#[tokio::test]
async fn test_applied_unit_is_recorded_after_its_statements() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-ClickHouse-User", "migrator"))
        .and(header("X-ClickHouse-Key", "ch-secret"))
        .and(header("X-ClickHouse-Database", "analytics"))
        .respond_with(ResponseTemplate::new(200))
        .expect(6)
        .mount(&mock_server)
        .await;

    let target = connect(&mock_server).await;
    let units = vec![MigrationUnit::new(
        1,
        "001_ticks.sql",
        "CREATE TABLE ticks (ts DateTime) ENGINE = MergeTree ORDER BY ts;\n\
         CREATE TABLE bars (ts DateTime) ENGINE = MergeTree ORDER BY ts;"
            .to_string(),
    )];

    let report = run_target(&target, units, RunMode::Apply)
        .await
        .expect("run should succeed");
    assert_eq!(report.applied_count(), 1);
    assert_eq!(report.already_applied, 0);

    let bodies = sent_bodies(&mock_server).await;
    assert_eq!(bodies.len(), 6, "unexpected requests: {:#?}", bodies);
    assert!(bodies[3].starts_with("CREATE TABLE ticks"));
    assert!(bodies[4].starts_with("CREATE TABLE bars"));
    assert_eq!(
        bodies[5],
        "INSERT INTO migration_history (version, name) FORMAT JSONEachRow\n\
         {\"version\":1,\"name\":\"001_ticks.sql\"}"
    );

    target.close();
}

#[tokio::test]
async fn test_unreadable_ledger_fails_before_any_unit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("SELECT version FROM migration_history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json\n"))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let target = connect(&mock_server).await;
    let units = vec![MigrationUnit::new(
        1,
        "001_a.sql",
        "CREATE TABLE a (x UInt8) ENGINE = Memory;".to_string(),
    )];

    let err = run_target(&target, units, RunMode::Apply)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Ledger { .. }), "unexpected error: {}", err);
    assert_eq!(err.failed_version(), None);

    let bodies = sent_bodies(&mock_server).await;
    assert!(bodies.iter().all(|b| !b.contains("CREATE TABLE a")));

    target.close();
}
