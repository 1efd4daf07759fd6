//! The `changes` payload of a log entry.
//!
//! Field changes serialize as a two-element array `[old, new]` (either side
//! may be `null`); many-to-many changes serialize as
//! `{"type": "m2m", "operation": "add", "objects": [...]}`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::M2mOperation;

/// Changed fields keyed by field name.
pub type Changes = BTreeMap<String, Change>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Change {
    Field(FieldChange),
    ManyToMany(M2mChange),
}

/// Old and new change strings of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldChange(pub Option<String>, pub Option<String>);

impl FieldChange {
    #[must_use]
    pub fn new(old: Option<String>, new: Option<String>) -> Self {
        Self(old, new)
    }

    #[must_use]
    pub fn old(&self) -> Option<&str> {
        self.0.as_deref()
    }

    #[must_use]
    pub fn new_value(&self) -> Option<&str> {
        self.1.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum M2mKind {
    M2m,
}

/// Objects added to or removed from a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct M2mChange {
    #[serde(rename = "type")]
    pub kind: M2mKind,
    pub operation: M2mOperation,
    pub objects: Vec<String>,
}

impl M2mChange {
    #[must_use]
    pub const fn new(operation: M2mOperation, objects: Vec<String>) -> Self {
        Self {
            kind: M2mKind::M2m,
            operation,
            objects,
        }
    }
}

impl Change {
    #[must_use]
    pub const fn as_field(&self) -> Option<&FieldChange> {
        match self {
            Self::Field(change) => Some(change),
            Self::ManyToMany(_) => None,
        }
    }

    #[must_use]
    pub const fn as_m2m(&self) -> Option<&M2mChange> {
        match self {
            Self::ManyToMany(change) => Some(change),
            Self::Field(_) => None,
        }
    }
}
