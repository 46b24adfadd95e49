//! Best-effort notification side channel.
//!
//! # Responsibility
//! - Describe the events the core may announce (new feedback, store failures).
//! - Deliver them without ever affecting the outcome of the calling operation.
//!
//! # Invariants
//! - [`notify_best_effort`] never returns an error and never panics on
//!   delivery failure; failures are logged and dropped.

use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const EMPTY_NAME_PLACEHOLDER: &str = "N/A";

/// Event handed to a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A feedback entry was stored.
    FeedbackReceived {
        feedback_id: String,
        name: Option<String>,
        email: String,
        message: String,
        created_at: i64,
    },
    /// A store call failed with a non-conditional error.
    StoreFailure {
        operation: &'static str,
        detail: String,
    },
}

impl NotificationEvent {
    /// Stable event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FeedbackReceived { .. } => "feedback_received",
            Self::StoreFailure { .. } => "store_failure",
        }
    }

    /// Human-readable subject line.
    pub fn subject(&self) -> String {
        match self {
            Self::FeedbackReceived { email, .. } => format!("New Feedback Received from {email}"),
            Self::StoreFailure { operation, .. } => format!("Diagram store failure: {operation}"),
        }
    }

    /// Plain-text body; line breaks in free text are kept as-is.
    pub fn body(&self) -> String {
        match self {
            Self::FeedbackReceived {
                feedback_id,
                name,
                email,
                message,
                created_at,
            } => format!(
                "feedback: {feedback_id}\nname: {}\nemail: {email}\ncreated_at: {created_at}\n\n{message}",
                name.as_deref()
                    .filter(|value| !value.is_empty())
                    .unwrap_or(EMPTY_NAME_PLACEHOLDER)
            ),
            Self::StoreFailure { operation, detail } => {
                format!("operation: {operation}\nerror: {detail}")
            }
        }
    }
}

/// Delivery failure reported by a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Outbound notification channel (email, chat, queue...).
pub trait Notifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        (**self).notify(event)
    }
}

/// Notifier that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that only records the event subject in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!(
            "event=notification module=notify status=ok kind={}",
            event.kind()
        );
        Ok(())
    }
}

/// Delivers `event`, absorbing and logging any failure.
pub fn notify_best_effort<N: Notifier + ?Sized>(notifier: &N, event: &NotificationEvent) {
    if let Err(err) = notifier.notify(event) {
        warn!(
            "event=notification module=notify status=error kind={} error={}",
            event.kind(),
            err
        );
    }
}
