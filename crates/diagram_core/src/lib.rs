//! Core domain logic for diagram record lifecycles.
//! This crate is the single source of truth for ownership and
//! soft-delete/recover/expire invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod retention;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LifecycleConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::diagram::{
    DiagramId, DiagramPatch, DiagramRecord, DiagramSummary, MutableField, NewDiagram, UserId,
    ValidationError,
};
pub use model::feedback::{FeedbackId, FeedbackRecord, NewFeedback};
pub use notify::{LogNotifier, NoopNotifier, NotificationEvent, Notifier, NotifyError};
pub use retention::RetentionPolicy;
pub use service::feedback::{FeedbackError, FeedbackService};
pub use service::lifecycle::{DiagramService, LifecycleError, LifecycleResult};
pub use store::{
    Attribute, AttributeUpdate, AttributeValue, Condition, FeedbackStore, PartialRecord,
    RecordKey, RecordStore, SqliteFeedbackStore, SqliteRecordStore, StoreError, StoreResult,
    UpdatedAttributes,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
