//! Persisted history records and their change rendering.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::changes::{Change, Changes};
use crate::display::NONE_DISPLAY;
use crate::enums::LogAction;

/// A persisted history record of one change to a tracked instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    /// `"<app_label>.<model>"` of the concrete entity.
    pub content_type: String,
    /// Primary key as text, always set.
    pub object_pk: String,
    /// Integer primary key, set only for integer-keyed instances.
    pub object_id: Option<i64>,
    pub object_repr: String,
    pub action: LogAction,
    pub changes: Changes,
    pub actor: Option<String>,
    pub remote_addr: Option<String>,
    pub cid: Option<String>,
    pub additional_data: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

/// A log entry before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub content_type: String,
    pub object_pk: String,
    pub object_id: Option<i64>,
    pub object_repr: String,
    pub action: LogAction,
    pub changes: Changes,
    pub actor: Option<String>,
    pub remote_addr: Option<String>,
    pub cid: Option<String>,
    pub additional_data: Option<Map<String, Value>>,
}

impl LogEntry {
    /// Render the changes as `field: old → new; ...` with the given separators.
    #[must_use]
    pub fn changes_str(&self, colon: &str, arrow: &str, separator: &str) -> String {
        self.changes
            .iter()
            .map(|(field, change)| match change {
                Change::Field(values) => format!(
                    "{field}{colon}{}{arrow}{}",
                    values.old().unwrap_or(NONE_DISPLAY),
                    values.new_value().unwrap_or(NONE_DISPLAY),
                ),
                Change::ManyToMany(m2m) => format!(
                    "{field}{colon}{} {}",
                    m2m.operation,
                    m2m.objects.join(", ")
                ),
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// [`changes_str`](Self::changes_str) with the default separators.
    #[must_use]
    pub fn changes_summary(&self) -> String {
        self.changes_str(": ", " → ", "; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{FieldChange, M2mChange};
    use crate::enums::M2mOperation;
    use pretty_assertions::assert_eq;

    fn entry(changes: Changes) -> LogEntry {
        LogEntry {
            id: 1,
            content_type: "auditlog_tests.simplemodel".into(),
            object_pk: "1".into(),
            object_id: Some(1),
            object_repr: "SimpleModel object (1)".into(),
            action: LogAction::Update,
            changes,
            actor: None,
            remote_addr: None,
            cid: None,
            additional_data: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn changes_str_default_separators() {
        let mut changes = Changes::new();
        changes.insert(
            "boolean".into(),
            Change::Field(FieldChange::new(Some("false".into()), Some("true".into()))),
        );
        changes.insert(
            "integer".into(),
            Change::Field(FieldChange::new(None, Some("5".into()))),
        );
        assert_eq!(
            entry(changes).changes_summary(),
            "boolean: false → true; integer: None → 5"
        );
    }

    #[test]
    fn changes_str_custom_separators_and_m2m() {
        let mut changes = Changes::new();
        changes.insert(
            "related".into(),
            Change::ManyToMany(M2mChange::new(
                M2mOperation::Add,
                vec!["A".into(), "B".into()],
            )),
        );
        assert_eq!(entry(changes).changes_str("=", "->", "|"), "related=add A, B");
    }
}
