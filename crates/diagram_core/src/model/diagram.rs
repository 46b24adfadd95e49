//! Diagram domain model.
//!
//! # Responsibility
//! - Define the stored diagram record and its list projection.
//! - Define the create/update input shapes and their structural checks.
//!
//! # Invariants
//! - `(id, user_id)` is the record key and never changes.
//! - `deleted_at.is_some() == ttl.is_some()`.
//! - `last_update >= created_at`.
//! - `viewport` and `history` are opaque and never interpreted by core.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-supplied diagram identifier, opaque to the core.
pub type DiagramId = String;

/// Already-resolved owner identifier (authenticated or guest).
pub type UserId = String;

/// Structural validation failure for incoming documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Required attribute is absent, named in wire spelling.
    MissingField(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "`{field}` attribute not found"),
        }
    }
}

impl Error for ValidationError {}

/// Canonical stored diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecord {
    pub id: DiagramId,
    pub user_id: UserId,
    pub name: String,
    pub viewport: Value,
    pub history: Value,
    /// Epoch ms, set once at creation.
    pub created_at: i64,
    /// Epoch ms, refreshed by every mutating write.
    pub last_update: i64,
    /// Epoch ms tombstone. Present means soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// Epoch seconds expiry marker, present only while soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl DiagramRecord {
    /// Returns whether the record is live (not in the recycle bin).
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// List projection of a diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSummary {
    pub id: DiagramId,
    pub name: String,
    pub viewport: Value,
    pub last_update: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

/// Candidate document submitted for creation.
///
/// Every field is optional at the type level so that a missing attribute is
/// reported by [`NewDiagram::validate`] instead of a parse failure. The
/// client-side `createdAt`/`lastUpdate` values only need to be present; the
/// engine replaces them with its own timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiagram {
    #[serde(default)]
    pub id: Option<DiagramId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub viewport: Option<Value>,
    #[serde(default)]
    pub history: Option<Value>,
    #[serde(default, alias = "createAt")]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub last_update: Option<Value>,
}

impl NewDiagram {
    /// Checks required attributes in canonical order:
    /// `name, history, createdAt, viewport, lastUpdate, id`.
    ///
    /// An empty `id` counts as missing because it cannot address a record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_none() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.history.is_none() {
            return Err(ValidationError::MissingField("history"));
        }
        if self.created_at.is_none() {
            return Err(ValidationError::MissingField("createdAt"));
        }
        if self.viewport.is_none() {
            return Err(ValidationError::MissingField("viewport"));
        }
        if self.last_update.is_none() {
            return Err(ValidationError::MissingField("lastUpdate"));
        }
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err(ValidationError::MissingField("id")),
        }
    }

    /// Validates and converts into an active record owned by `user_id`.
    ///
    /// `created_at` and `last_update` are both set to `now_ms`.
    pub fn into_record(
        self,
        user_id: impl Into<UserId>,
        now_ms: i64,
    ) -> Result<DiagramRecord, ValidationError> {
        self.validate()?;
        let (Some(id), Some(name), Some(viewport), Some(history)) =
            (self.id, self.name, self.viewport, self.history)
        else {
            return Err(ValidationError::MissingField("id"));
        };

        Ok(DiagramRecord {
            id,
            user_id: user_id.into(),
            name,
            viewport,
            history,
            created_at: now_ms,
            last_update: now_ms,
            deleted_at: None,
            ttl: None,
        })
    }
}

/// Closed set of attributes a client may patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutableField {
    Name,
    Viewport,
    History,
}

/// Partial update: each field independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub viewport: Option<Value>,
    #[serde(default)]
    pub history: Option<Value>,
}

impl DiagramPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_viewport(mut self, viewport: Value) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_history(mut self, history: Value) -> Self {
        self.history = Some(history);
        self
    }

    /// Returns true when no mutable field is supplied.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.viewport.is_none() && self.history.is_none()
    }

    /// Supplied fields in fixed order `name, viewport, history`.
    pub fn fields(&self) -> Vec<MutableField> {
        let mut fields = Vec::with_capacity(3);
        if self.name.is_some() {
            fields.push(MutableField::Name);
        }
        if self.viewport.is_some() {
            fields.push(MutableField::Viewport);
        }
        if self.history.is_some() {
            fields.push(MutableField::History);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagramPatch, MutableField, NewDiagram, ValidationError};
    use serde_json::json;

    fn complete() -> NewDiagram {
        serde_json::from_value(json!({
            "id": "d-1",
            "name": "Orders",
            "viewport": {"x": 0, "y": 0, "zoom": 1},
            "history": {"current": 0, "states": []},
            "createdAt": "2024-01-01T00:00:00Z",
            "lastUpdate": "2024-01-01T00:00:00Z"
        }))
        .expect("complete document should parse")
    }

    #[test]
    fn complete_document_passes() {
        assert_eq!(complete().validate(), Ok(()));
    }

    #[test]
    fn name_only_reports_history_first() {
        let doc: NewDiagram = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(doc.validate(), Err(ValidationError::MissingField("history")));
    }

    #[test]
    fn each_missing_field_is_reported_by_name() {
        let cases: [(&str, &str); 6] = [
            ("name", "name"),
            ("history", "history"),
            ("createdAt", "createdAt"),
            ("viewport", "viewport"),
            ("lastUpdate", "lastUpdate"),
            ("id", "id"),
        ];
        for (key, expected) in cases {
            let mut value = serde_json::to_value(complete()).unwrap();
            value.as_object_mut().unwrap().remove(key);
            let doc: NewDiagram = serde_json::from_value(value).unwrap();
            assert_eq!(doc.validate(), Err(ValidationError::MissingField(expected)));
        }
    }

    #[test]
    fn legacy_create_at_spelling_is_accepted() {
        let doc: NewDiagram = serde_json::from_value(json!({
            "id": "d-1",
            "name": "n",
            "viewport": {},
            "history": {},
            "createAt": "2024-01-01",
            "lastUpdate": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(doc.validate(), Ok(()));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        let mut doc = complete();
        doc.id = Some(String::new());
        assert_eq!(doc.validate(), Err(ValidationError::MissingField("id")));
    }

    #[test]
    fn patch_fields_follow_fixed_order() {
        let patch = DiagramPatch::default()
            .with_history(json!({"current": 1}))
            .with_name("renamed");
        assert_eq!(patch.fields(), vec![MutableField::Name, MutableField::History]);
        assert!(DiagramPatch::default().is_empty());
    }
}
