//! Per-entity tracking options, as stored by a registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::Entity;
use crate::field::FieldDef;

/// Which fields of an entity are captured and how they are presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingOptions {
    /// When non-empty, only these fields are tracked.
    pub include_fields: BTreeSet<String>,
    /// Never tracked.
    pub exclude_fields: BTreeSet<String>,
    /// Field name → display label.
    pub mapping_fields: BTreeMap<String, String>,
    /// Tracked, but stored redacted.
    pub mask_fields: BTreeSet<String>,
    /// Many-to-many fields whose changes are logged.
    pub m2m_fields: BTreeSet<String>,
}

impl TrackingOptions {
    /// Whether a field with this name is captured.
    #[must_use]
    pub fn is_tracked(&self, field: &str) -> bool {
        (self.include_fields.is_empty() || self.include_fields.contains(field))
            && !self.exclude_fields.contains(field)
    }

    /// Snapshot fields of `entity` that are captured, in declaration order.
    pub fn tracked_fields<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a FieldDef> {
        entity
            .concrete_fields()
            .filter(move |field| self.is_tracked(&field.name))
    }

    #[must_use]
    pub fn is_masked(&self, field: &str) -> bool {
        self.mask_fields.contains(field)
    }

    /// Display label override for `field`.
    #[must_use]
    pub fn mapped_label(&self, field: &str) -> Option<&str> {
        self.mapping_fields.get(field).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude() {
        let mut options = TrackingOptions::default();
        assert!(options.is_tracked("anything"));

        options.include_fields.insert("label".into());
        assert!(options.is_tracked("label"));
        assert!(!options.is_tracked("text"));

        options.include_fields.clear();
        options.exclude_fields.insert("text".into());
        assert!(options.is_tracked("label"));
        assert!(!options.is_tracked("text"));
    }
}
