//! Record store adapter contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the narrow key-value contract the lifecycle engine relies on.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every write touches exactly one item and is atomic.
//! - A failed precondition leaves the item untouched and reports
//!   `StoreError::ConditionFailed`, distinct from transport failures.
//! - Owner scans have no secondary index; cost grows with table size.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::diagram::DiagramRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod expr;
pub mod feedback;
mod schema;
pub mod sqlite;

pub use expr::{
    Attribute, AttributeKind, AttributeUpdate, AttributeValue, Condition, PartialRecord,
    UpdatedAttributes,
};
pub use feedback::{FeedbackStore, SqliteFeedbackStore};
pub use sqlite::SqliteRecordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Precondition did not hold (or the item does not exist).
    ConditionFailed,
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Configured table name is unusable.
    Config(ConfigError),
    /// Update or condition cannot be applied as written.
    InvalidExpression(String),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(String),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: String,
        column: &'static str,
    },
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConditionFailed => write!(f, "conditional request failed"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::InvalidExpression(message) => write!(f, "invalid store expression: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Composite primary key of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
}

impl<'a> RecordKey<'a> {
    pub fn new(id: &'a str, user_id: &'a str) -> Self {
        Self { id, user_id }
    }
}

/// Key-value contract required from the backing store.
pub trait RecordStore {
    /// Loads one record by key regardless of lifecycle state.
    fn get(&self, key: RecordKey<'_>) -> StoreResult<Option<DiagramRecord>>;
    /// Inserts or overwrites one record unconditionally.
    fn put(&self, record: &DiagramRecord) -> StoreResult<()>;
    /// Applies `update` only if `condition` holds; returns assigned values.
    fn conditional_update(
        &self,
        key: RecordKey<'_>,
        update: &AttributeUpdate,
        condition: &Condition,
    ) -> StoreResult<UpdatedAttributes>;
    /// Removes the item only if `condition` holds.
    fn conditional_delete(&self, key: RecordKey<'_>, condition: &Condition) -> StoreResult<()>;
    /// Full scan filtered by owner, limited to `projection`.
    fn scan_by_owner(
        &self,
        user_id: &str,
        projection: &[Attribute],
    ) -> StoreResult<Vec<PartialRecord>>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn get(&self, key: RecordKey<'_>) -> StoreResult<Option<DiagramRecord>> {
        (**self).get(key)
    }

    fn put(&self, record: &DiagramRecord) -> StoreResult<()> {
        (**self).put(record)
    }

    fn conditional_update(
        &self,
        key: RecordKey<'_>,
        update: &AttributeUpdate,
        condition: &Condition,
    ) -> StoreResult<UpdatedAttributes> {
        (**self).conditional_update(key, update, condition)
    }

    fn conditional_delete(&self, key: RecordKey<'_>, condition: &Condition) -> StoreResult<()> {
        (**self).conditional_delete(key, condition)
    }

    fn scan_by_owner(
        &self,
        user_id: &str,
        projection: &[Attribute],
    ) -> StoreResult<Vec<PartialRecord>> {
        (**self).scan_by_owner(user_id, projection)
    }
}
