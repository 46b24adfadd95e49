//! SQLite-backed diagram record store.
//!
//! # Responsibility
//! - Map the key-value store contract onto one SQLite table.
//! - Render typed conditions into `WHERE` clauses so that every conditional
//!   write is a single atomic statement.
//!
//! # Invariants
//! - Conditional writes never insert rows.
//! - Read paths reject persisted rows that break record invariants.
//! - JSON documents are stored as TEXT and parsed back on read.
//! - `last_update` never drops below `created_at`, even when the caller's
//!   clock steps backwards.

use crate::config::validate_table_name;
use crate::model::diagram::DiagramRecord;
use crate::retention::RetentionPolicy;
use crate::store::expr::{
    Attribute, AttributeKind, AttributeUpdate, AttributeValue, Condition, PartialRecord,
    UpdatedAttributes,
};
use crate::store::schema::ensure_table_ready;
use crate::store::{RecordKey, RecordStore, StoreError, StoreResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "name",
    "viewport",
    "history",
    "created_at",
    "last_update",
    "deleted_at",
    "ttl",
];

const RECORD_COLUMNS: &str =
    "id, user_id, name, viewport, history, created_at, last_update, deleted_at, ttl";

/// SQLite-backed record store over one configured table.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
    table: String,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection, table: &str) -> StoreResult<Self> {
        validate_table_name(table)?;
        ensure_table_ready(conn, table, REQUIRED_COLUMNS)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// Physically removes soft-deleted rows whose TTL has passed.
    ///
    /// Stands in for native TTL reaping; hosts schedule it, the lifecycle
    /// engine never calls it.
    pub fn reap_expired(&self, now_ms: i64) -> StoreResult<usize> {
        let cutoff_secs = RetentionPolicy::reap_cutoff(now_ms);
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {}
                 WHERE deleted_at IS NOT NULL
                   AND ttl IS NOT NULL
                   AND ttl <= ?1;",
                self.table
            ),
            [cutoff_secs],
        )?;
        info!(
            "event=store_reap module=store status=ok table={} removed={}",
            self.table, removed
        );
        Ok(removed)
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn get(&self, key: RecordKey<'_>) -> StoreResult<Option<DiagramRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM {}
             WHERE id = ?1 AND user_id = ?2;",
            self.table
        ))?;

        let mut rows = stmt.query(params![key.id, key.user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }

        Ok(None)
    }

    fn put(&self, record: &DiagramRecord) -> StoreResult<()> {
        check_record(record)?;

        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({RECORD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                self.table
            ),
            params![
                record.id.as_str(),
                record.user_id.as_str(),
                record.name.as_str(),
                record.viewport.to_string(),
                record.history.to_string(),
                record.created_at,
                record.last_update,
                record.deleted_at,
                record.ttl,
            ],
        )?;

        Ok(())
    }

    fn conditional_update(
        &self,
        key: RecordKey<'_>,
        update: &AttributeUpdate,
        condition: &Condition,
    ) -> StoreResult<UpdatedAttributes> {
        update.check().map_err(StoreError::InvalidExpression)?;

        let mut assignments = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        for (attribute, value) in update.assignments() {
            let column = column_for(*attribute);
            if *attribute == Attribute::LastUpdate {
                assignments.push(format!("{column} = MAX(?, created_at)"));
            } else {
                assignments.push(format!("{column} = ?"));
            }
            bind_values.push(to_sql_value(value));
        }
        for attribute in update.removals() {
            assignments.push(format!("{} = NULL", column_for(*attribute)));
        }

        let mut returning = vec!["id"];
        returning.extend(
            update
                .assignments()
                .iter()
                .map(|(attribute, _)| column_for(*attribute)),
        );

        bind_values.push(Value::Text(key.id.to_string()));
        bind_values.push(Value::Text(key.user_id.to_string()));
        let condition_sql = render_condition(condition, &mut bind_values);

        let sql = format!(
            "UPDATE {}
             SET {}
             WHERE id = ? AND user_id = ? AND ({condition_sql})
             RETURNING {};",
            self.table,
            assignments.join(", "),
            returning.join(", ")
        );
        debug!(
            "event=store_update module=store status=start table={} assignments={} removals={}",
            self.table,
            update.assignments().len(),
            update.removals().len()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let returned = stmt
            .query_row(params_from_iter(bind_values), |row| {
                let mut values = Vec::with_capacity(returning.len() - 1);
                for index in 1..returning.len() {
                    values.push(row.get::<_, Value>(index)?);
                }
                Ok(values)
            })
            .optional()?;

        let Some(raw_values) = returned else {
            return Err(StoreError::ConditionFailed);
        };

        let mut updated = BTreeMap::new();
        for ((attribute, _), raw) in update.assignments().iter().zip(raw_values) {
            updated.insert(*attribute, from_sql_value(*attribute, raw)?);
        }
        Ok(UpdatedAttributes::new(updated))
    }

    fn conditional_delete(&self, key: RecordKey<'_>, condition: &Condition) -> StoreResult<()> {
        let mut bind_values = vec![
            Value::Text(key.id.to_string()),
            Value::Text(key.user_id.to_string()),
        ];
        let condition_sql = render_condition(condition, &mut bind_values);

        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {}
                 WHERE id = ? AND user_id = ? AND ({condition_sql});",
                self.table
            ),
            params_from_iter(bind_values),
        )?;

        if removed == 0 {
            return Err(StoreError::ConditionFailed);
        }

        Ok(())
    }

    fn scan_by_owner(
        &self,
        user_id: &str,
        projection: &[Attribute],
    ) -> StoreResult<Vec<PartialRecord>> {
        let mut columns = vec!["id"];
        columns.extend(projection.iter().map(|attribute| column_for(*attribute)));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE user_id = ?1;",
            columns.join(", "),
            self.table
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let mut attributes = BTreeMap::new();
            for (offset, attribute) in projection.iter().enumerate() {
                let raw: Value = row.get(offset + 1)?;
                if matches!(raw, Value::Null) {
                    if attribute.is_optional() {
                        continue;
                    }
                    return Err(StoreError::InvalidData(format!(
                        "required column `{}` is NULL for id `{id}`",
                        column_for(*attribute)
                    )));
                }
                attributes.insert(*attribute, from_sql_value(*attribute, raw)?);
            }
            items.push(PartialRecord { id, attributes });
        }

        Ok(items)
    }
}

fn column_for(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Name => "name",
        Attribute::Viewport => "viewport",
        Attribute::History => "history",
        Attribute::CreatedAt => "created_at",
        Attribute::LastUpdate => "last_update",
        Attribute::DeletedAt => "deleted_at",
        Attribute::Ttl => "ttl",
    }
}

fn render_condition(condition: &Condition, bind_values: &mut Vec<Value>) -> String {
    match condition {
        // The key match in the WHERE clause already requires the row.
        Condition::ItemExists => "1 = 1".to_string(),
        Condition::OwnerIs(user_id) => {
            bind_values.push(Value::Text(user_id.clone()));
            "user_id = ?".to_string()
        }
        Condition::AttributeExists(attribute) => {
            format!("{} IS NOT NULL", column_for(*attribute))
        }
        Condition::AttributeNotExists(attribute) => {
            format!("{} IS NULL", column_for(*attribute))
        }
        Condition::All(parts) if parts.is_empty() => "1 = 1".to_string(),
        Condition::All(parts) => parts
            .iter()
            .map(|part| format!("({})", render_condition(part, bind_values)))
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}

fn to_sql_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Text(text) => Value::Text(text.clone()),
        AttributeValue::Number(number) => Value::Integer(*number),
        AttributeValue::Document(document) => Value::Text(document.to_string()),
    }
}

fn from_sql_value(attribute: Attribute, raw: Value) -> StoreResult<AttributeValue> {
    match (attribute.kind(), raw) {
        (AttributeKind::Text, Value::Text(text)) => Ok(AttributeValue::Text(text)),
        (AttributeKind::Number, Value::Integer(number)) => Ok(AttributeValue::Number(number)),
        (AttributeKind::Document, Value::Text(text)) => {
            parse_document(column_for(attribute), &text).map(AttributeValue::Document)
        }
        (_, other) => Err(StoreError::InvalidData(format!(
            "unexpected {:?} in column `{}`",
            other.data_type(),
            column_for(attribute)
        ))),
    }
}

fn parse_document(column: &str, text: &str) -> StoreResult<serde_json::Value> {
    serde_json::from_str(text)
        .map_err(|err| StoreError::InvalidData(format!("invalid JSON in column `{column}`: {err}")))
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<DiagramRecord> {
    let viewport_text: String = row.get("viewport")?;
    let history_text: String = row.get("history")?;

    let record = DiagramRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        viewport: parse_document("viewport", &viewport_text)?,
        history: parse_document("history", &history_text)?,
        created_at: row.get("created_at")?,
        last_update: row.get("last_update")?,
        deleted_at: row.get("deleted_at")?,
        ttl: row.get("ttl")?,
    };
    check_record(&record)?;
    Ok(record)
}

fn check_record(record: &DiagramRecord) -> StoreResult<()> {
    if record.deleted_at.is_some() != record.ttl.is_some() {
        return Err(StoreError::InvalidData(format!(
            "record `{}` must carry both or neither of deletedAt/ttl",
            record.id
        )));
    }
    if record.last_update < record.created_at {
        return Err(StoreError::InvalidData(format!(
            "record `{}` has lastUpdate before createdAt",
            record.id
        )));
    }
    Ok(())
}
