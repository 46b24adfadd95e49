//! Explicit startup configuration for the diagram core.
//!
//! # Responsibility
//! - Enumerate every option the core recognizes.
//! - Reject values that would produce unsafe SQL or a zero-length undo window.
//!
//! # Invariants
//! - Table names are plain SQL identifiers and are safe to interpolate.
//! - `retention_window` is strictly positive.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "diagrams";
pub const DEFAULT_FEEDBACK_TABLE_NAME: &str = "feedback";
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid table name regex"));

/// Configuration errors reported by [`LifecycleConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Table name is not a plain SQL identifier.
    InvalidTableName(String),
    /// Diagram and feedback records must not share one table.
    TableNameCollision(String),
    /// Soft-deleted records would expire immediately.
    ZeroRetentionWindow,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTableName(name) => write!(
                f,
                "invalid table name `{name}`; expected [A-Za-z_][A-Za-z0-9_]* up to 63 chars"
            ),
            Self::TableNameCollision(name) => {
                write!(f, "diagram and feedback tables must differ, both are `{name}`")
            }
            Self::ZeroRetentionWindow => write!(f, "retention window must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}

/// Options recognized by the lifecycle core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Target table for diagram records.
    pub table_name: String,
    /// Target table for feedback records.
    pub feedback_table_name: String,
    /// How long a soft-deleted diagram stays recoverable.
    pub retention_window: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            feedback_table_name: DEFAULT_FEEDBACK_TABLE_NAME.to_string(),
            retention_window: Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 60 * 60),
        }
    }
}

impl LifecycleConfig {
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_feedback_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.feedback_table_name = table_name.into();
        self
    }

    pub fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// Checks every option, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_table_name(&self.table_name)?;
        validate_table_name(&self.feedback_table_name)?;
        if self.table_name.eq_ignore_ascii_case(&self.feedback_table_name) {
            return Err(ConfigError::TableNameCollision(self.table_name.clone()));
        }
        if self.retention_window.is_zero() {
            return Err(ConfigError::ZeroRetentionWindow);
        }
        Ok(())
    }
}

/// Returns `Ok` when `name` can be interpolated into SQL as a table identifier.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    if TABLE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}
