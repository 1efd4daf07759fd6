//! Row parsing helpers.
//!
//! `libsql::Row` is column-indexed; these helpers convert the TEXT columns
//! that hold timestamps and JSON documents.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::DatabaseError;

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00+00:00"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Extract an optional JSON object from a TEXT column. JSON `null` reads as `None`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string is not a JSON object.
pub fn parse_optional_object(s: Option<&str>) -> Result<Option<Map<String, Value>>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => {
            match serde_json::from_str(s)
                .map_err(|e| DatabaseError::Query(format!("Invalid JSON in column: {e}")))?
            {
                Value::Object(map) => Ok(Some(map)),
                Value::Null => Ok(None),
                other => Err(DatabaseError::Query(format!(
                    "Expected a JSON object, found: {other}"
                ))),
            }
        }
        _ => Ok(None),
    }
}
