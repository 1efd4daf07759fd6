//! Primary-key and field values.
//!
//! `FieldValue::to_change_string` is the single canonical rendering that both
//! diffing and history records use, so two values are "the same" for
//! tracking purposes exactly when their change strings are equal.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::PkKind;
use crate::field::FieldKind;

// ---------------------------------------------------------------------------
// PkValue
// ---------------------------------------------------------------------------

/// A primary-key value. Entities may be keyed by an integer, a string or a UUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PkValue {
    Int(i64),
    Str(String),
    Uuid(Uuid),
}

impl PkValue {
    /// Integer keys can be stored in the indexed `object_id` column.
    #[must_use]
    pub const fn as_indexable(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) | Self::Uuid(_) => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PkKind {
        match self {
            Self::Int(_) => PkKind::Int,
            Self::Str(_) => PkKind::Str,
            Self::Uuid(_) => PkKind::Uuid,
        }
    }
}

impl fmt::Display for PkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{}", u.hyphenated()),
        }
    }
}

impl From<i64> for PkValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PkValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PkValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Uuid> for PkValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// The value held by one field of an [`Instance`](crate::instance::Instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(Uuid),
    Json(Value),
    Array(Vec<FieldValue>),
    Ref(PkValue),
}

impl FieldValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Canonical string form compared by the diff and stored in changes.
    ///
    /// `Null` has no string form. Aware datetimes are normalised to naive UTC,
    /// so an aware and a naive datetime naming the same UTC instant render
    /// identically.
    #[must_use]
    pub fn to_change_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::DateTime(dt) => Some(dt.naive_utc().to_string()),
            Self::NaiveDateTime(dt) => Some(dt.to_string()),
            Self::Date(d) => Some(d.to_string()),
            Self::Time(t) => Some(t.to_string()),
            Self::Uuid(u) => Some(u.hyphenated().to_string()),
            Self::Json(v) => Some(canonical_json(v).to_string()),
            Self::Array(_) => Some(self.to_json_element().to_string()),
            Self::Ref(pk) => Some(pk.to_string()),
        }
    }

    fn to_json_element(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Json(v) => canonical_json(v),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json_element).collect()),
            other => other.to_change_string().map_or(Value::Null, Value::String),
        }
    }

    /// Whether this value may be stored in a field of `kind`. `Null` always
    /// fits; nullability is checked separately.
    #[must_use]
    pub fn fits(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Self::Null, _) => true,
            (Self::Int(_), FieldKind::AutoInteger | FieldKind::Integer)
            | (Self::Bool(_), FieldKind::Boolean)
            | (Self::Text(_), FieldKind::Char { .. } | FieldKind::Text)
            | (Self::DateTime(_) | Self::NaiveDateTime(_), FieldKind::DateTime { .. })
            | (Self::Date(_), FieldKind::Date)
            | (Self::Time(_), FieldKind::Time)
            | (Self::Uuid(_), FieldKind::Uuid { .. })
            | (Self::Json(_), FieldKind::Json)
            | (Self::Ref(_), FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. }) => true,
            (Self::Array(items), FieldKind::Array { base, .. }) => {
                items.iter().all(|item| !item.is_null() && item.fits(base))
            }
            _ => false,
        }
    }

    /// Whether this value may reference an entity keyed by `target`. `Null`
    /// always fits; non-reference values never do.
    #[must_use]
    pub const fn fits_reference(&self, target: PkKind) -> bool {
        match self {
            Self::Null => true,
            Self::Ref(key) => matches!(
                (key.kind(), target),
                (PkKind::Int, PkKind::Int) | (PkKind::Str, PkKind::Str) | (PkKind::Uuid, PkKind::Uuid)
            ),
            _ => false,
        }
    }

    /// An aware datetime from any timezone-aware chrono value.
    pub fn datetime<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        Self::DateTime(value.fixed_offset())
    }

    /// Text array, the usual shape of choice-constrained array fields.
    pub fn text_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }
}

/// Rebuild a JSON value with object keys inserted in sorted order, so the
/// rendering does not depend on how the map was populated.
fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::NaiveDateTime(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<PkValue> for FieldValue {
    fn from(value: PkValue) -> Self {
        Self::Ref(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
