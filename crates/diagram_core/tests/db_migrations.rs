use diagram_core::db::migrations::latest_version;
use diagram_core::db::{open_db, open_db_in_memory, DbError};
use diagram_core::{ConfigError, LifecycleConfig};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory(&LifecycleConfig::default()).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "diagrams");
    assert_table_exists(&conn, "feedback");
}

#[test]
fn configured_table_names_are_created() {
    let config = LifecycleConfig::default()
        .with_table_name("erd_diagrams")
        .with_feedback_table_name("erd_feedback");
    let conn = open_db_in_memory(&config).unwrap();

    assert_table_exists(&conn, "erd_diagrams");
    assert_table_exists(&conn, "erd_feedback");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diagrams.db");
    let config = LifecycleConfig::default();

    let conn_first = open_db(&path, &config).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path, &config).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "diagrams");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path, &LifecycleConfig::default()).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_config_is_rejected_before_touching_schema() {
    let config = LifecycleConfig::default().with_table_name("drop table");
    let err = open_db_in_memory(&config).unwrap_err();
    assert!(matches!(
        err,
        DbError::Config(ConfigError::InvalidTableName(name)) if name == "drop table"
    ));
}

#[test]
fn tombstone_without_ttl_violates_table_check() {
    let conn = open_db_in_memory(&LifecycleConfig::default()).unwrap();
    let result = conn.execute(
        "INSERT INTO diagrams (id, user_id, name, viewport, history, created_at, last_update, deleted_at)
         VALUES ('d', 'u', 'n', '{}', '{}', 1, 1, 5);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn owner_scan_is_a_full_table_scan() {
    let conn = open_db_in_memory(&LifecycleConfig::default()).unwrap();
    let mut stmt = conn
        .prepare("EXPLAIN QUERY PLAN SELECT id, name FROM diagrams WHERE user_id = ?1;")
        .unwrap();
    let details: Vec<String> = stmt
        .query_map(["u"], |row| row.get(3))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(details.len(), 1);
    assert!(details[0].starts_with("SCAN"), "unexpected plan: {details:?}");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "expected table `{table_name}` to exist");
}
