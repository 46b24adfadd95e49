//! Feedback submission use-case.
//!
//! # Responsibility
//! - Validate and persist a feedback entry for the calling user.
//! - Announce the stored entry through the notification side channel.
//!
//! # Invariants
//! - The entry is persisted before any notification is attempted.
//! - A notification failure never fails the submission.

use crate::clock::Clock;
use crate::model::diagram::ValidationError;
use crate::model::feedback::{FeedbackId, FeedbackRecord, NewFeedback};
use crate::notify::{notify_best_effort, NotificationEvent, Notifier};
use crate::store::{FeedbackStore, StoreError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from feedback submission.
#[derive(Debug)]
pub enum FeedbackError {
    MissingField(&'static str),
    BadRequest(String),
    StoreUnavailable(StoreError),
}

impl Display for FeedbackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "`{field}` attribute not found"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::StoreUnavailable(err) => write!(f, "feedback store unavailable: {err}"),
        }
    }
}

impl Error for FeedbackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for FeedbackError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::MissingField(field) => Self::MissingField(field),
        }
    }
}

/// Feedback service over an injected store, clock and notifier.
pub struct FeedbackService<S: FeedbackStore, C: Clock, N: Notifier> {
    store: S,
    clock: C,
    notifier: N,
}

impl<S: FeedbackStore, C: Clock, N: Notifier> FeedbackService<S, C, N> {
    pub fn new(store: S, clock: C, notifier: N) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    /// Stores one feedback entry and notifies best-effort.
    pub fn submit(&self, user_id: &str, feedback: NewFeedback) -> Result<FeedbackId, FeedbackError> {
        if user_id.is_empty() {
            return Err(FeedbackError::BadRequest(
                "caller identity must not be empty".to_string(),
            ));
        }
        feedback.validate().inspect_err(|err| {
            warn!(
                "event=feedback_submit module=feedback status=rejected user_id={} error={}",
                user_id, err
            );
        })?;

        let (Some(id), Some(email), Some(message)) = (feedback.id, feedback.email, feedback.message)
        else {
            return Err(FeedbackError::MissingField("id"));
        };
        let now = self.clock.now_epoch_ms();
        let record = FeedbackRecord {
            id,
            user_id: user_id.to_string(),
            name: feedback.name,
            email,
            message,
            created_at: now,
            last_update: now,
        };

        if let Err(err) = self.store.put_feedback(&record) {
            error!(
                "event=feedback_submit module=feedback status=error feedback_id={} error={}",
                record.id, err
            );
            return Err(FeedbackError::StoreUnavailable(err));
        }
        info!(
            "event=feedback_submit module=feedback status=ok user_id={} feedback_id={}",
            user_id, record.id
        );

        notify_best_effort(
            &self.notifier,
            &NotificationEvent::FeedbackReceived {
                feedback_id: record.id.clone(),
                name: record.name,
                email: record.email,
                message: record.message,
                created_at: record.created_at,
            },
        );

        Ok(record.id)
    }
}
