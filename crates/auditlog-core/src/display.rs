//! Human-readable rendering of stored changes.

use std::collections::BTreeMap;
use std::fmt::{Display, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::changes::{Change, Changes, M2mChange};
use crate::entity::Entity;
use crate::field::{FieldDef, FieldKind};
use crate::tracking::TrackingOptions;

/// Shown for an absent side of a change and for unknown choices.
pub const NONE_DISPLAY: &str = "None";

/// Formatting applied by [`changes_display_dict`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Longer values are cut to this many characters plus `...`.
    pub truncate_len: usize,
    /// chrono format string for datetime fields.
    pub datetime_format: String,
    pub date_format: String,
    pub time_format: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            truncate_len: 140,
            datetime_format: "%b %-d, %Y %H:%M".to_string(),
            date_format: "%b %-d, %Y".to_string(),
            time_format: "%H:%M".to_string(),
        }
    }
}

/// Whether chrono accepts every specifier of `format`.
#[must_use]
pub fn is_valid_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// One displayed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DisplayChange {
    /// `[old, new]` as shown to humans.
    Values(Vec<String>),
    ManyToMany(M2mChange),
}

/// Display label → displayed change.
pub type DisplayDict = BTreeMap<String, DisplayChange>;

/// Render `changes` of an entry for `entity` with labels and formatted values.
#[must_use]
pub fn changes_display_dict(
    changes: &Changes,
    entity: &Entity,
    options: &TrackingOptions,
    settings: &DisplaySettings,
) -> DisplayDict {
    let mut out = DisplayDict::new();
    for (name, change) in changes {
        let field = entity.field(name);
        let label = options.mapped_label(name).map_or_else(
            || field.map_or_else(|| name.clone(), FieldDef::display_name),
            str::to_string,
        );

        let display = match change {
            Change::ManyToMany(m2m) => DisplayChange::ManyToMany(m2m.clone()),
            Change::Field(values) => DisplayChange::Values(
                [values.old(), values.new_value()]
                    .into_iter()
                    .map(|value| display_value(value.unwrap_or(NONE_DISPLAY), field, settings))
                    .collect(),
            ),
        };
        out.insert(label, display);
    }
    out
}

fn display_value(value: &str, field: Option<&FieldDef>, settings: &DisplaySettings) -> String {
    let Some(field) = field else {
        return truncate(value, settings.truncate_len);
    };

    if field.has_choices() {
        return display_choice(value, field);
    }

    match &field.kind {
        FieldKind::DateTime { .. } => reformat(value, |v| {
            NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|dt| dt.format(&settings.datetime_format))
        }),
        FieldKind::Date => reformat(value, |v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .ok()
                .map(|d| d.format(&settings.date_format))
        }),
        FieldKind::Time => reformat(value, |v| {
            NaiveTime::parse_from_str(v, "%H:%M:%S%.f")
                .ok()
                .map(|t| t.format(&settings.time_format))
        }),
        _ => truncate(value, settings.truncate_len),
    }
}

/// Choice labels; a JSON array shows each element's label.
fn display_choice(value: &str, field: &FieldDef) -> String {
    let label = |v: &str| field.choice_label(v).unwrap_or(NONE_DISPLAY).to_string();
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => label(s),
                other => label(&other.to_string()),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => label(value),
    }
}

/// Values that do not parse, or formats chrono cannot render, leave the
/// value unchanged.
fn reformat<D: Display>(value: &str, format: impl Fn(&str) -> Option<D>) -> String {
    let Some(formatted) = format(value) else {
        return value.to_string();
    };
    let mut out = String::new();
    match write!(out, "{formatted}") {
        Ok(()) => out,
        Err(_) => value.to_string(),
    }
}

fn truncate(value: &str, len: usize) -> String {
    if value.chars().count() > len {
        let head: String = value.chars().take(len).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}
