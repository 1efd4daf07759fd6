//! Actions, deletion behaviours and many-to-many operations.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// LogAction
// ---------------------------------------------------------------------------

/// The kind of event a log entry records.
///
/// The numeric codes are the values persisted in the `action` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Create,
    Update,
    Delete,
    Access,
}

impl LogAction {
    pub const ALL: [Self; 4] = [Self::Create, Self::Update, Self::Delete, Self::Access];

    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Create => 0,
            Self::Update => 1,
            Self::Delete => 2,
            Self::Access => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an unknown code.
    pub fn from_code(code: i64) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|action| action.code() == code)
            .ok_or_else(|| CoreError::Validation(format!("unknown log action code {code}")))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Access => "access",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OnDelete
// ---------------------------------------------------------------------------

/// What happens to a referencing object when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    Cascade,
    SetNull,
    DoNothing,
}

impl OnDelete {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::SetNull => "set_null",
            Self::DoNothing => "do_nothing",
        }
    }
}

impl fmt::Display for OnDelete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// M2mOperation
// ---------------------------------------------------------------------------

/// Direction of a many-to-many change. Clearing a relation is recorded as
/// a `Delete` of every linked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum M2mOperation {
    Add,
    Delete,
}

impl M2mOperation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for M2mOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
