//! Field-level diff between two snapshots of an instance.

use crate::changes::{Change, Changes, FieldChange};
use crate::entity::Entity;
use crate::errors::CoreError;
use crate::instance::Instance;
use crate::tracking::TrackingOptions;

/// Redact a value by replacing the first half of its characters with `*`.
///
/// The value keeps its length, so a masked field is still visibly present.
#[must_use]
pub fn mask_str(value: &str) -> String {
    let count = value.chars().count();
    let masked = count / 2;
    let mut out = "*".repeat(masked);
    out.extend(value.chars().skip(masked));
    out
}

/// Compare two snapshots of the same instance through `options`.
///
/// A missing side (creation or deletion) reads every field as absent.
/// Returns `Ok(None)` when no tracked field differs.
///
/// # Errors
///
/// Returns `CoreError::Validation` when both sides are missing.
pub fn model_instance_diff(
    old: Option<&Instance>,
    new: Option<&Instance>,
    entity: &Entity,
    options: &TrackingOptions,
) -> Result<Option<Changes>, CoreError> {
    if old.is_none() && new.is_none() {
        return Err(CoreError::Validation(format!(
            "nothing to diff for {}",
            entity.name()
        )));
    }

    let mut changes = Changes::new();
    for field in options.tracked_fields(entity) {
        let old_value = old.and_then(|i| i.value(&field.name).to_change_string());
        let new_value = new.and_then(|i| i.value(&field.name).to_change_string());
        if old_value == new_value {
            continue;
        }

        let change = if options.is_masked(&field.name) {
            FieldChange::new(
                old_value.as_deref().map(mask_str),
                new_value.as_deref().map(mask_str),
            )
        } else {
            FieldChange::new(old_value, new_value)
        };
        changes.insert(field.name.clone(), Change::Field(change));
    }

    if changes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(changes))
    }
}
