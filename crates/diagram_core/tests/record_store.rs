use diagram_core::db::migrations::latest_version;
use diagram_core::db::{open_db, open_db_in_memory};
use diagram_core::{
    Attribute, AttributeUpdate, AttributeValue, Condition, DiagramPatch, DiagramRecord,
    DiagramService, LifecycleConfig, LifecycleError, ManualClock, NewDiagram, RecordKey,
    RecordStore, SqliteRecordStore, StoreError,
};
use rusqlite::Connection;
use serde_json::json;

const T0: i64 = 1_700_000_000_000;

fn record(id: &str, user_id: &str) -> DiagramRecord {
    DiagramRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("diagram {id}"),
        viewport: json!({"x": 0, "y": 0, "zoom": 1}),
        history: json!({"current": 0, "states": []}),
        created_at: T0,
        last_update: T0,
        deleted_at: None,
        ttl: None,
    }
}

fn binned(id: &str, user_id: &str, ttl: i64) -> DiagramRecord {
    DiagramRecord {
        deleted_at: Some(T0),
        ttl: Some(ttl),
        ..record(id, user_id)
    }
}

#[test]
fn put_then_get_roundtrip_and_overwrite() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();

    let mut item = record("d-1", "u");
    store.put(&item).unwrap();
    assert_eq!(store.get(RecordKey::new("d-1", "u")).unwrap(), Some(item.clone()));

    item.name = "replaced".to_string();
    store.put(&item).unwrap();
    assert_eq!(
        store.get(RecordKey::new("d-1", "u")).unwrap().unwrap().name,
        "replaced"
    );
    assert!(store.get(RecordKey::new("d-1", "other")).unwrap().is_none());
}

#[test]
fn put_rejects_tombstone_without_ttl() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();

    let broken = DiagramRecord {
        deleted_at: Some(T0),
        ..record("d-1", "u")
    };
    assert!(matches!(store.put(&broken), Err(StoreError::InvalidData(_))));
}

#[test]
fn conditional_update_applies_only_when_condition_holds() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    store.put(&record("d-1", "u")).unwrap();

    let update = AttributeUpdate::new()
        .set(Attribute::Name, AttributeValue::Text("renamed".to_string()))
        .set(Attribute::LastUpdate, AttributeValue::Number(T0 + 1));

    let gated = Condition::ItemExists.and(Condition::AttributeExists(Attribute::DeletedAt));
    let err = store
        .conditional_update(RecordKey::new("d-1", "u"), &update, &gated)
        .unwrap_err();
    assert!(err.is_condition_failed());
    assert_eq!(
        store.get(RecordKey::new("d-1", "u")).unwrap().unwrap().name,
        "diagram d-1"
    );

    let open = Condition::ItemExists.and(Condition::OwnerIs("u".to_string()));
    let updated = store
        .conditional_update(RecordKey::new("d-1", "u"), &update, &open)
        .unwrap();
    assert_eq!(
        updated.get(Attribute::Name),
        Some(&AttributeValue::Text("renamed".to_string()))
    );
    assert_eq!(
        updated.get(Attribute::LastUpdate),
        Some(&AttributeValue::Number(T0 + 1))
    );
}

#[test]
fn conditional_update_never_creates_items() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();

    let update = AttributeUpdate::new().set(Attribute::LastUpdate, AttributeValue::Number(T0));
    let err = store
        .conditional_update(RecordKey::new("ghost", "u"), &update, &Condition::All(vec![]))
        .unwrap_err();
    assert!(err.is_condition_failed());
    assert!(store.get(RecordKey::new("ghost", "u")).unwrap().is_none());
}

#[test]
fn conditional_update_rejects_malformed_updates() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    store.put(&record("d-1", "u")).unwrap();

    let update = AttributeUpdate::new().set(Attribute::History, AttributeValue::Number(1));
    let err = store
        .conditional_update(RecordKey::new("d-1", "u"), &update, &Condition::ItemExists)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidExpression(_)));
}

#[test]
fn conditional_delete_respects_condition() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    store.put(&record("live", "u")).unwrap();
    store.put(&binned("gone", "u", T0 / 1000 + 10)).unwrap();

    let only_binned = Condition::AttributeExists(Attribute::DeletedAt);
    assert!(store
        .conditional_delete(RecordKey::new("live", "u"), &only_binned)
        .unwrap_err()
        .is_condition_failed());
    store
        .conditional_delete(RecordKey::new("gone", "u"), &only_binned)
        .unwrap();
    assert!(store.get(RecordKey::new("gone", "u")).unwrap().is_none());
    assert!(store.get(RecordKey::new("live", "u")).unwrap().is_some());
}

#[test]
fn scan_by_owner_projects_and_filters_by_owner() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    store.put(&record("a", "u")).unwrap();
    store.put(&binned("b", "u", T0 / 1000 + 10)).unwrap();
    store.put(&record("c", "someone-else")).unwrap();

    let mut items = store
        .scan_by_owner("u", &[Attribute::Name, Attribute::DeletedAt])
        .unwrap();
    items.sort_by(|left, right| left.id.cmp(&right.id));

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "a");
    assert_eq!(items[0].text(Attribute::Name), Some("diagram a"));
    assert!(!items[0].has(Attribute::DeletedAt));
    assert!(!items[0].has(Attribute::Viewport));
    assert_eq!(items[1].number(Attribute::DeletedAt), Some(T0));
}

#[test]
fn reap_expired_removes_only_due_soft_deleted_rows() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    let now_secs = T0 / 1000;
    store.put(&record("live", "u")).unwrap();
    store.put(&binned("due", "u", now_secs)).unwrap();
    store.put(&binned("later", "u", now_secs + 1)).unwrap();

    assert_eq!(store.reap_expired(T0).unwrap(), 1);
    assert!(store.get(RecordKey::new("due", "u")).unwrap().is_none());
    assert!(store.get(RecordKey::new("later", "u")).unwrap().is_some());
    assert!(store.get(RecordKey::new("live", "u")).unwrap().is_some());
}

#[test]
fn soft_deleted_records_are_reaped_once_retention_passes() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    let clock = ManualClock::new(T0);
    let service = DiagramService::new(&store, &clock, &config).unwrap();

    let doc: NewDiagram = serde_json::from_value(json!({
        "id": "d-1", "name": "n", "viewport": {}, "history": {},
        "createdAt": "x", "lastUpdate": "x"
    }))
    .unwrap();
    service.create("u", doc).unwrap();
    service.soft_delete("u", "d-1").unwrap();

    let window_ms = i64::try_from(config.retention_window.as_millis()).unwrap();
    assert_eq!(store.reap_expired(T0 + window_ms - 1_000).unwrap(), 0);
    assert!(service.get("u", "d-1").is_ok());

    assert_eq!(store.reap_expired(T0 + window_ms).unwrap(), 1);
    assert!(matches!(
        service.get("u", "d-1"),
        Err(LifecycleError::NotFound(_))
    ));
}

#[test]
fn custom_table_name_is_used_for_storage() {
    let config = LifecycleConfig::default().with_table_name("erd_diagrams");
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, "erd_diagrams").unwrap();
    store.put(&record("d-1", "u")).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM erd_diagrams;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert!(matches!(
        SqliteRecordStore::try_new(&conn, "diagrams"),
        Err(StoreError::MissingRequiredTable(table)) if table == "diagrams"
    ));
}

#[test]
fn store_rejects_unsafe_table_name() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    assert!(matches!(
        SqliteRecordStore::try_new(&conn, "diagrams; DROP TABLE diagrams"),
        Err(StoreError::Config(_))
    ));
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteRecordStore::try_new(&conn, "diagrams") {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_table_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE diagrams (
            id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            viewport TEXT NOT NULL,
            history TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_update INTEGER NOT NULL,
            PRIMARY KEY (id, user_id)
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteRecordStore::try_new(&conn, "diagrams"),
        Err(StoreError::MissingRequiredColumn { column: "deleted_at", .. })
    ));
}

#[test]
fn racing_sessions_see_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diagrams.sqlite3");
    let config = LifecycleConfig::default();
    let conn_a = open_db(&path, &config).unwrap();
    let conn_b = open_db(&path, &config).unwrap();
    let store_a = SqliteRecordStore::try_new(&conn_a, &config.table_name).unwrap();
    let store_b = SqliteRecordStore::try_new(&conn_b, &config.table_name).unwrap();
    let clock = ManualClock::new(T0);
    let session_a = DiagramService::new(&store_a, &clock, &config).unwrap();
    let session_b = DiagramService::new(&store_b, &clock, &config).unwrap();

    let doc: NewDiagram = serde_json::from_value(json!({
        "id": "d-1", "name": "n", "viewport": {}, "history": {},
        "createdAt": "x", "lastUpdate": "x"
    }))
    .unwrap();
    session_a.create("u", doc).unwrap();

    session_b.soft_delete("u", "d-1").unwrap();
    let lost = session_a
        .update("u", "d-1", &DiagramPatch::default().with_name("late edit"))
        .unwrap_err();
    assert!(matches!(lost, LifecycleError::Conflict(_)));
    assert!(matches!(
        session_a.soft_delete("u", "d-1"),
        Err(LifecycleError::Conflict(_))
    ));

    let seen_by_a = session_a.get("u", "d-1").unwrap();
    assert_eq!(seen_by_a.name, "n");
    assert!(seen_by_a.is_soft_deleted());
}

#[test]
fn put_rejects_last_update_before_created_at() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    let stale = DiagramRecord {
        last_update: T0 - 1,
        ..record("d-1", "u")
    };

    assert!(matches!(
        store.put(&stale),
        Err(StoreError::InvalidData(message)) if message.contains("lastUpdate")
    ));
    assert!(store.get(RecordKey::new("d-1", "u")).unwrap().is_none());
}

#[test]
fn last_update_assignment_is_clamped_to_created_at() {
    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config).unwrap();
    let store = SqliteRecordStore::try_new(&conn, &config.table_name).unwrap();
    store.put(&record("d-1", "u")).unwrap();

    let updated = store
        .conditional_update(
            RecordKey::new("d-1", "u"),
            &AttributeUpdate::new()
                .set(Attribute::LastUpdate, AttributeValue::Number(T0 - 5_000)),
            &Condition::ItemExists,
        )
        .unwrap();

    assert_eq!(
        updated.get(Attribute::LastUpdate),
        Some(&AttributeValue::Number(T0))
    );
    let stored = store.get(RecordKey::new("d-1", "u")).unwrap().unwrap();
    assert_eq!(stored.last_update, T0);
}
