//! Feedback persistence contract and SQLite implementation.
//!
//! Feedback entries are write-once; the only mutation is the initial put.

use crate::config::validate_table_name;
use crate::model::feedback::FeedbackRecord;
use crate::store::schema::ensure_table_ready;
use crate::store::{RecordKey, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "name",
    "email",
    "message",
    "created_at",
    "last_update",
];

/// Store contract for feedback records.
pub trait FeedbackStore {
    fn put_feedback(&self, record: &FeedbackRecord) -> StoreResult<()>;
    fn get_feedback(&self, key: RecordKey<'_>) -> StoreResult<Option<FeedbackRecord>>;
}

impl<S: FeedbackStore + ?Sized> FeedbackStore for &S {
    fn put_feedback(&self, record: &FeedbackRecord) -> StoreResult<()> {
        (**self).put_feedback(record)
    }

    fn get_feedback(&self, key: RecordKey<'_>) -> StoreResult<Option<FeedbackRecord>> {
        (**self).get_feedback(key)
    }
}

/// SQLite-backed feedback store.
pub struct SqliteFeedbackStore<'conn> {
    conn: &'conn Connection,
    table: String,
}

impl<'conn> SqliteFeedbackStore<'conn> {
    pub fn try_new(conn: &'conn Connection, table: &str) -> StoreResult<Self> {
        validate_table_name(table)?;
        ensure_table_ready(conn, table, REQUIRED_COLUMNS)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }
}

impl FeedbackStore for SqliteFeedbackStore<'_> {
    fn put_feedback(&self, record: &FeedbackRecord) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (
                    id,
                    user_id,
                    name,
                    email,
                    message,
                    created_at,
                    last_update
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                self.table
            ),
            params![
                record.id.as_str(),
                record.user_id.as_str(),
                record.name.as_deref(),
                record.email.as_str(),
                record.message.as_str(),
                record.created_at,
                record.last_update,
            ],
        )?;
        Ok(())
    }

    fn get_feedback(&self, key: RecordKey<'_>) -> StoreResult<Option<FeedbackRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, user_id, name, email, message, created_at, last_update
                     FROM {}
                     WHERE id = ?1 AND user_id = ?2;",
                    self.table
                ),
                params![key.id, key.user_id],
                |row| {
                    Ok(FeedbackRecord {
                        id: row.get("id")?,
                        user_id: row.get("user_id")?,
                        name: row.get("name")?,
                        email: row.get("email")?,
                        message: row.get("message")?,
                        created_at: row.get("created_at")?,
                        last_update: row.get("last_update")?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
