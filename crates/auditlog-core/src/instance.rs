//! Entity instances and the related-object view handed to additional-data hooks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{FieldValue, PkValue};

static NULL: FieldValue = FieldValue::Null;

/// A snapshot of one entity instance: the entity name plus concrete field values.
///
/// Many-to-many relations are not part of the snapshot; they are managed as
/// links by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    entity: String,
    values: BTreeMap<String, FieldValue>,
}

impl Instance {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Re-label the snapshot, e.g. to load a concrete row as its proxy.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Value of `field`, treating an unset field as `Null`.
    #[must_use]
    pub fn value(&self, field: &str) -> &FieldValue {
        self.values.get(field).unwrap_or(&NULL)
    }

    /// Text value of `field`, if it holds text.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.value(field) {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.values.remove(field)
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Primary-key value held in `pk_field`, if set and non-null.
    #[must_use]
    pub fn pk_in(&self, pk_field: &str) -> Option<PkValue> {
        match self.value(pk_field) {
            FieldValue::Int(n) => Some(PkValue::Int(*n)),
            FieldValue::Text(s) => Some(PkValue::Str(s.clone())),
            FieldValue::Uuid(u) => Some(PkValue::Uuid(*u)),
            FieldValue::Ref(pk) => Some(pk.clone()),
            _ => None,
        }
    }
}

/// Objects reachable from an instance, resolved by the storage layer before
/// an additional-data hook runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedContext {
    related: BTreeMap<String, Instance>,
    many: BTreeMap<String, Vec<PkValue>>,
}

impl RelatedContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the target of a foreign-key or one-to-one field.
    pub fn insert_related(&mut self, field: impl Into<String>, target: Instance) {
        self.related.insert(field.into(), target);
    }

    /// Record the linked keys of a many-to-many field. Keys are kept sorted.
    pub fn insert_many(&mut self, field: impl Into<String>, mut keys: Vec<PkValue>) {
        keys.sort();
        self.many.insert(field.into(), keys);
    }

    #[must_use]
    pub fn related(&self, field: &str) -> Option<&Instance> {
        self.related.get(field)
    }

    #[must_use]
    pub fn many(&self, field: &str) -> &[PkValue] {
        self.many.get(field).map_or(&[], Vec::as_slice)
    }

    /// Lowest linked key of a many-to-many field.
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&PkValue> {
        self.many(field).first()
    }
}
