//! Diagram lifecycle engine.
//!
//! # Responsibility
//! - Expose create/get/list/update/soft-delete/recover/permanent-delete.
//! - Express each state transition as one conditional store call.
//! - Map store outcomes to caller-facing error kinds.
//!
//! # Invariants
//! - Every mutation is scoped to `(id, user_id)` and gated on ownership.
//! - Update and soft-delete require the record to be active; recover and
//!   permanent delete require it to be soft-deleted.
//! - A failed precondition is reported as `Conflict`, never retried, and never
//!   says whether the record belongs to someone else.
//! - Notification failures never change an operation's result.

use crate::clock::Clock;
use crate::config::{ConfigError, LifecycleConfig};
use crate::model::diagram::{
    DiagramId, DiagramPatch, DiagramRecord, DiagramSummary, MutableField, NewDiagram,
    ValidationError,
};
use crate::notify::{notify_best_effort, NoopNotifier, NotificationEvent, Notifier};
use crate::retention::RetentionPolicy;
use crate::store::{
    Attribute, AttributeUpdate, AttributeValue, Condition, PartialRecord, RecordKey, RecordStore,
    StoreError, UpdatedAttributes,
};
use log::{error, info, warn};
use std::cmp::Reverse;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SUMMARY_PROJECTION: &[Attribute] = &[
    Attribute::Name,
    Attribute::Viewport,
    Attribute::LastUpdate,
    Attribute::DeletedAt,
];

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors surfaced by lifecycle operations.
#[derive(Debug)]
pub enum LifecycleError {
    /// Create document lacks a required attribute.
    MissingField(&'static str),
    /// Request shape is unusable (empty id, empty patch, empty user).
    BadRequest(String),
    /// No record exists for `(id, user_id)`.
    NotFound(DiagramId),
    /// Ownership or lifecycle-state precondition failed.
    Conflict(DiagramId),
    /// Backing store failed for a reason other than a precondition.
    StoreUnavailable(StoreError),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "`{field}` attribute not found"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::NotFound(id) => write!(f, "diagram with id {id} not found"),
            Self::Conflict(id) => write!(
                f,
                "diagram with id {id} is not in a state that allows this operation"
            ),
            Self::StoreUnavailable(err) => write!(f, "diagram store unavailable: {err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::MissingField(field) => Self::MissingField(field),
        }
    }
}

/// Lifecycle engine over an injected store, clock and notifier.
pub struct DiagramService<S: RecordStore, C: Clock, N: Notifier = NoopNotifier> {
    store: S,
    clock: C,
    retention: RetentionPolicy,
    notifier: N,
}

impl<S: RecordStore, C: Clock> DiagramService<S, C> {
    /// Creates an engine that drops notifications.
    ///
    /// # Errors
    /// - `config` fails [`LifecycleConfig::validate`].
    pub fn new(store: S, clock: C, config: &LifecycleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            retention: RetentionPolicy::new(config.retention_window),
            notifier: NoopNotifier,
        })
    }
}

impl<S: RecordStore, C: Clock, N: Notifier> DiagramService<S, C, N> {
    /// Replaces the notification channel.
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> DiagramService<S, C, M> {
        DiagramService {
            store: self.store,
            clock: self.clock,
            retention: self.retention,
            notifier,
        }
    }

    /// Stores a new active diagram owned by `user_id`.
    ///
    /// An existing record under the same key is overwritten.
    pub fn create(&self, user_id: &str, document: NewDiagram) -> LifecycleResult<DiagramId> {
        require_user(user_id)?;
        let now = self.clock.now_epoch_ms();
        let record = document.into_record(user_id, now).inspect_err(|err| {
            warn!(
                "event=diagram_create module=lifecycle status=rejected user_id={} error={}",
                user_id, err
            );
        })?;

        self.store
            .put(&record)
            .map_err(|err| self.store_error("diagram_create", &record.id, err))?;

        info!(
            "event=diagram_create module=lifecycle status=ok user_id={} diagram_id={}",
            user_id, record.id
        );
        Ok(record.id)
    }

    /// Loads one diagram in any lifecycle state.
    pub fn get(&self, user_id: &str, id: &str) -> LifecycleResult<DiagramRecord> {
        require_user(user_id)?;
        require_id(id)?;
        self.store
            .get(RecordKey::new(id, user_id))
            .map_err(|err| self.store_error("diagram_get", id, err))?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    /// Lists the caller's active diagrams, newest first.
    pub fn list(&self, user_id: &str) -> LifecycleResult<Vec<DiagramSummary>> {
        self.list_where(user_id, "diagram_list", |summary| summary.deleted_at.is_none())
    }

    /// Lists the caller's soft-deleted diagrams, newest first.
    pub fn list_deleted(&self, user_id: &str) -> LifecycleResult<Vec<DiagramSummary>> {
        self.list_where(user_id, "diagram_list_deleted", |summary| {
            summary.deleted_at.is_some()
        })
    }

    /// Patches the supplied fields of an active diagram.
    ///
    /// Returns the new values of every assigned attribute, `lastUpdate`
    /// included.
    pub fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: &DiagramPatch,
    ) -> LifecycleResult<UpdatedAttributes> {
        require_user(user_id)?;
        require_id(id)?;
        if patch.is_empty() {
            return Err(LifecycleError::BadRequest(
                "expected at least one of `name`, `viewport`, `history`".to_string(),
            ));
        }

        let update = patch_update(patch, self.clock.now_epoch_ms());
        self.apply(
            "diagram_update",
            user_id,
            id,
            &update,
            &active_owned_by(user_id),
        )
    }

    /// Moves an active diagram into the recycle bin with an expiry marker.
    pub fn soft_delete(&self, user_id: &str, id: &str) -> LifecycleResult<()> {
        require_user(user_id)?;
        require_id(id)?;

        let now = self.clock.now_epoch_ms();
        let update = AttributeUpdate::new()
            .set(Attribute::DeletedAt, AttributeValue::Number(now))
            .set(
                Attribute::Ttl,
                AttributeValue::Number(self.retention.expires_at(now)),
            )
            .set(Attribute::LastUpdate, AttributeValue::Number(now));
        self.apply(
            "diagram_soft_delete",
            user_id,
            id,
            &update,
            &active_owned_by(user_id),
        )?;
        Ok(())
    }

    /// Restores a soft-deleted diagram, clearing its tombstone and expiry.
    pub fn recover(&self, user_id: &str, id: &str) -> LifecycleResult<UpdatedAttributes> {
        require_user(user_id)?;
        require_id(id)?;

        let update = AttributeUpdate::new()
            .remove(Attribute::DeletedAt)
            .remove(Attribute::Ttl)
            .set(
                Attribute::LastUpdate,
                AttributeValue::Number(self.clock.now_epoch_ms()),
            );
        self.apply(
            "diagram_recover",
            user_id,
            id,
            &update,
            &soft_deleted_owned_by(user_id),
        )
    }

    /// Destroys a soft-deleted diagram. Active diagrams are refused.
    pub fn permanent_delete(&self, user_id: &str, id: &str) -> LifecycleResult<()> {
        require_user(user_id)?;
        require_id(id)?;

        self.store
            .conditional_delete(RecordKey::new(id, user_id), &soft_deleted_owned_by(user_id))
            .map_err(|err| self.mutation_error("diagram_permanent_delete", user_id, id, err))?;

        info!(
            "event=diagram_permanent_delete module=lifecycle status=ok user_id={} diagram_id={}",
            user_id, id
        );
        Ok(())
    }

    fn apply(
        &self,
        operation: &'static str,
        user_id: &str,
        id: &str,
        update: &AttributeUpdate,
        condition: &Condition,
    ) -> LifecycleResult<UpdatedAttributes> {
        let updated = self
            .store
            .conditional_update(RecordKey::new(id, user_id), update, condition)
            .map_err(|err| self.mutation_error(operation, user_id, id, err))?;

        info!(
            "event={} module=lifecycle status=ok user_id={} diagram_id={} attributes={}",
            operation,
            user_id,
            id,
            updated.len()
        );
        Ok(updated)
    }

    fn list_where<F>(
        &self,
        user_id: &str,
        operation: &'static str,
        keep: F,
    ) -> LifecycleResult<Vec<DiagramSummary>>
    where
        F: Fn(&DiagramSummary) -> bool,
    {
        require_user(user_id)?;
        let items = self
            .store
            .scan_by_owner(user_id, SUMMARY_PROJECTION)
            .map_err(|err| self.store_error(operation, "*", err))?;

        let mut summaries = Vec::with_capacity(items.len());
        for item in items {
            let summary =
                summary_from_partial(item).map_err(|err| self.store_error(operation, "*", err))?;
            if keep(&summary) {
                summaries.push(summary);
            }
        }
        summaries.sort_by(|a, b| {
            (Reverse(a.last_update), &a.id).cmp(&(Reverse(b.last_update), &b.id))
        });

        info!(
            "event={} module=lifecycle status=ok user_id={} count={}",
            operation,
            user_id,
            summaries.len()
        );
        Ok(summaries)
    }

    fn mutation_error(
        &self,
        operation: &'static str,
        user_id: &str,
        id: &str,
        err: StoreError,
    ) -> LifecycleError {
        if err.is_condition_failed() {
            warn!(
                "event={} module=lifecycle status=conflict user_id={} diagram_id={}",
                operation, user_id, id
            );
            return LifecycleError::Conflict(id.to_string());
        }
        self.store_error(operation, id, err)
    }

    fn store_error(&self, operation: &'static str, id: &str, err: StoreError) -> LifecycleError {
        error!(
            "event={} module=lifecycle status=error diagram_id={} error={}",
            operation, id, err
        );
        notify_best_effort(
            &self.notifier,
            &NotificationEvent::StoreFailure {
                operation,
                detail: err.to_string(),
            },
        );
        LifecycleError::StoreUnavailable(err)
    }
}

fn require_user(user_id: &str) -> LifecycleResult<()> {
    if user_id.is_empty() {
        return Err(LifecycleError::BadRequest(
            "caller identity must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_id(id: &str) -> LifecycleResult<()> {
    if id.is_empty() {
        return Err(LifecycleError::BadRequest("`id` is required".to_string()));
    }
    Ok(())
}

fn active_owned_by(user_id: &str) -> Condition {
    Condition::ItemExists
        .and(Condition::OwnerIs(user_id.to_string()))
        .and(Condition::AttributeNotExists(Attribute::DeletedAt))
}

fn soft_deleted_owned_by(user_id: &str) -> Condition {
    Condition::ItemExists
        .and(Condition::OwnerIs(user_id.to_string()))
        .and(Condition::AttributeExists(Attribute::DeletedAt))
}

/// Builds the assignment set for a patch: supplied fields in fixed order,
/// then `lastUpdate`.
fn patch_update(patch: &DiagramPatch, now_ms: i64) -> AttributeUpdate {
    let mut update = AttributeUpdate::new();
    for field in patch.fields() {
        update = match field {
            MutableField::Name => match &patch.name {
                Some(name) => update.set(Attribute::Name, AttributeValue::Text(name.clone())),
                None => update,
            },
            MutableField::Viewport => match &patch.viewport {
                Some(viewport) => {
                    update.set(Attribute::Viewport, AttributeValue::Document(viewport.clone()))
                }
                None => update,
            },
            MutableField::History => match &patch.history {
                Some(history) => {
                    update.set(Attribute::History, AttributeValue::Document(history.clone()))
                }
                None => update,
            },
        };
    }
    update.set(Attribute::LastUpdate, AttributeValue::Number(now_ms))
}

fn summary_from_partial(item: PartialRecord) -> Result<DiagramSummary, StoreError> {
    let missing = |attribute: Attribute| {
        StoreError::InvalidData(format!(
            "scan item `{}` lacks `{}`",
            item.id,
            attribute.wire_name()
        ))
    };

    let name = item
        .text(Attribute::Name)
        .ok_or_else(|| missing(Attribute::Name))?
        .to_string();
    let viewport = item
        .document(Attribute::Viewport)
        .ok_or_else(|| missing(Attribute::Viewport))?
        .clone();
    let last_update = item
        .number(Attribute::LastUpdate)
        .ok_or_else(|| missing(Attribute::LastUpdate))?;
    let deleted_at = item.number(Attribute::DeletedAt);

    Ok(DiagramSummary {
        id: item.id,
        name,
        viewport,
        last_update,
        deleted_at,
    })
}
