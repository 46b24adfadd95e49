//! Typed attribute and condition expressions for conditional writes.
//!
//! # Responsibility
//! - Name the closed set of mutable record attributes.
//! - Describe assignments/removals and the precondition gating them.
//!
//! # Invariants
//! - Key attributes (`id`, `user_id`) are never part of an update.
//! - An attribute is never both assigned and removed in one update.
//! - Each attribute only ever carries its own value kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Non-key attributes of a stored diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    Name,
    Viewport,
    History,
    CreatedAt,
    LastUpdate,
    DeletedAt,
    Ttl,
}

/// Value kind an attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Text,
    Number,
    Document,
}

impl Attribute {
    /// Wire/attribute-map spelling.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Viewport => "viewport",
            Self::History => "history",
            Self::CreatedAt => "createdAt",
            Self::LastUpdate => "lastUpdate",
            Self::DeletedAt => "deletedAt",
            Self::Ttl => "ttl",
        }
    }

    pub fn kind(self) -> AttributeKind {
        match self {
            Self::Name => AttributeKind::Text,
            Self::Viewport | Self::History => AttributeKind::Document,
            Self::CreatedAt | Self::LastUpdate | Self::DeletedAt | Self::Ttl => {
                AttributeKind::Number
            }
        }
    }

    /// Whether the attribute may be absent on a stored item.
    pub fn is_optional(self) -> bool {
        matches!(self, Self::DeletedAt | Self::Ttl)
    }
}

/// One attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(i64),
    Document(Value),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Text(_) => AttributeKind::Text,
            Self::Number(_) => AttributeKind::Number,
            Self::Document(_) => AttributeKind::Document,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Self::Document(value) => Some(value),
            _ => None,
        }
    }
}

/// Assignments and removals applied atomically to one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdate {
    set: Vec<(Attribute, AttributeValue)>,
    remove: Vec<Attribute>,
}

impl AttributeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `attribute`, replacing an earlier assignment of the same one.
    pub fn set(mut self, attribute: Attribute, value: AttributeValue) -> Self {
        self.set.retain(|(existing, _)| *existing != attribute);
        self.set.push((attribute, value));
        self
    }

    pub fn remove(mut self, attribute: Attribute) -> Self {
        if !self.remove.contains(&attribute) {
            self.remove.push(attribute);
        }
        self
    }

    pub fn assignments(&self) -> &[(Attribute, AttributeValue)] {
        &self.set
    }

    pub fn removals(&self) -> &[Attribute] {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Rejects shapes no store should apply.
    pub fn check(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("update has no assignments or removals".to_string());
        }
        for (attribute, value) in &self.set {
            if attribute.kind() != value.kind() {
                return Err(format!(
                    "attribute `{}` expects {:?}, got {:?}",
                    attribute.wire_name(),
                    attribute.kind(),
                    value.kind()
                ));
            }
            if self.remove.contains(attribute) {
                return Err(format!(
                    "attribute `{}` is both assigned and removed",
                    attribute.wire_name()
                ));
            }
        }
        for attribute in &self.remove {
            if !attribute.is_optional() {
                return Err(format!(
                    "attribute `{}` is required and cannot be removed",
                    attribute.wire_name()
                ));
            }
        }
        Ok(())
    }
}

/// Boolean precondition over the item addressed by the key.
///
/// A key with no stored item fails every condition; conditional writes never
/// create items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    ItemExists,
    OwnerIs(String),
    AttributeExists(Attribute),
    AttributeNotExists(Attribute),
    All(Vec<Condition>),
}

impl Condition {
    /// Conjunction, flattening nested `All`s.
    pub fn and(self, other: Condition) -> Condition {
        let mut parts = match self {
            Condition::All(parts) => parts,
            single => vec![single],
        };
        match other {
            Condition::All(more) => parts.extend(more),
            single => parts.push(single),
        }
        Condition::All(parts)
    }
}

/// New values of the attributes an update assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatedAttributes(BTreeMap<Attribute, AttributeValue>);

impl UpdatedAttributes {
    pub fn new(values: BTreeMap<Attribute, AttributeValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, attribute: Attribute) -> Option<&AttributeValue> {
        self.0.get(&attribute)
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.0.contains_key(&attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Item returned by an owner scan, limited to the requested projection.
///
/// Absent optional attributes are simply missing from `attributes`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    pub id: String,
    pub attributes: BTreeMap<Attribute, AttributeValue>,
}

impl PartialRecord {
    pub fn has(&self, attribute: Attribute) -> bool {
        self.attributes.contains_key(&attribute)
    }

    pub fn text(&self, attribute: Attribute) -> Option<&str> {
        self.attributes.get(&attribute).and_then(AttributeValue::as_text)
    }

    pub fn number(&self, attribute: Attribute) -> Option<i64> {
        self.attributes
            .get(&attribute)
            .and_then(AttributeValue::as_number)
    }

    pub fn document(&self, attribute: Attribute) -> Option<&Value> {
        self.attributes
            .get(&attribute)
            .and_then(AttributeValue::as_document)
    }
}
