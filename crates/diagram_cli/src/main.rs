//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `diagram_core` linkage.
//! - Walk one diagram through create, soft delete and recover on an
//!   in-memory database with deterministic output.

use diagram_core::db::open_db_in_memory;
use diagram_core::{
    default_log_level, init_logging, DiagramService, LifecycleConfig, LogNotifier, NewDiagram,
    SqliteRecordStore, SystemClock,
};
use serde_json::json;
use std::error::Error;

const SMOKE_USER: &str = "smoke-user";
const SMOKE_DIAGRAM: &str = "smoke-diagram";

fn main() -> Result<(), Box<dyn Error>> {
    println!("diagram_core ping={}", diagram_core::ping());
    println!("diagram_core version={}", diagram_core::core_version());

    let log_dir = std::env::temp_dir().join("diagram_cli_logs");
    init_logging(default_log_level(), &log_dir.to_string_lossy())?;
    println!("logging dir={}", log_dir.display());

    let config = LifecycleConfig::default();
    let conn = open_db_in_memory(&config)?;
    let store = SqliteRecordStore::try_new(&conn, &config.table_name)?;
    let service = DiagramService::new(store, SystemClock, &config)?.with_notifier(LogNotifier);

    let document: NewDiagram = serde_json::from_value(json!({
        "id": SMOKE_DIAGRAM,
        "name": "Smoke",
        "viewport": {"x": 0, "y": 0, "zoom": 1},
        "history": {"nodes": [], "edges": []},
        "createdAt": 0,
        "lastUpdate": 0
    }))?;

    let id = service.create(SMOKE_USER, document)?;
    println!("create id={id} active={}", service.list(SMOKE_USER)?.len());

    service.soft_delete(SMOKE_USER, &id)?;
    println!(
        "soft_delete active={} deleted={}",
        service.list(SMOKE_USER)?.len(),
        service.list_deleted(SMOKE_USER)?.len()
    );

    service.recover(SMOKE_USER, &id)?;
    println!("recover active={}", service.list(SMOKE_USER)?.len());

    // Active records cannot be purged.
    match service.permanent_delete(SMOKE_USER, &id) {
        Ok(()) => println!("permanent_delete status=unexpected_ok"),
        Err(err) => println!("permanent_delete status=rejected reason={err}"),
    }

    Ok(())
}
