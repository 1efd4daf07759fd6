//! Error types shared by the schema, value and diff layers.
//!
//! Registry, configuration and storage errors live in their own crates and
//! wrap `CoreError` where they surface it.

use thiserror::Error;

/// Errors raised while declaring entities or checking instances against them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No entity with this name was declared.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The entity has no field with this name.
    #[error("Unknown field: {entity}.{field}")]
    UnknownField { entity: String, field: String },

    /// Two declarations used the same entity name.
    #[error("Entity declared twice: {0}")]
    DuplicateEntity(String),

    /// Proxy or multi-table parent is missing, or the chain loops.
    #[error("Invalid inheritance for {entity}: {reason}")]
    InvalidInheritance { entity: String, reason: String },

    /// A value does not fit the field it was assigned to.
    #[error("Type mismatch for {entity}.{field}: expected {expected}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
    },

    /// A non-nullable field has no value and no default.
    #[error("Missing value for {entity}.{field}")]
    MissingValue { entity: String, field: String },

    /// Data failed validation (length limits, key format, etc.).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
