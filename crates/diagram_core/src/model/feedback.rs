//! Feedback domain model.
//!
//! Feedback records share the diagram key shape `(id, user_id)` but have no
//! lifecycle beyond creation.

use crate::model::diagram::{UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Caller-supplied feedback identifier.
pub type FeedbackId = String;

/// Persisted feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub message: String,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub last_update: i64,
}

/// Candidate feedback submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    #[serde(default)]
    pub id: Option<FeedbackId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewFeedback {
    /// Checks required attributes in order `id, email, message`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => {}
            _ => return Err(ValidationError::MissingField("id")),
        }
        if self.email.is_none() {
            return Err(ValidationError::MissingField("email"));
        }
        if self.message.is_none() {
            return Err(ValidationError::MissingField("message"));
        }
        Ok(())
    }
}
