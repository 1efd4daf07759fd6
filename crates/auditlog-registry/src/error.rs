//! Registration error types.

use auditlog_core::errors::CoreError;
use thiserror::Error;

/// Errors from registering entities.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An option names a field the entity has no snapshot field for.
    #[error("Unknown field in {option}: {entity}.{field}")]
    UnknownField {
        entity: String,
        field: String,
        option: &'static str,
    },

    /// `m2m_fields` names a field that is not many-to-many.
    #[error("Not a many-to-many field: {entity}.{field}")]
    NotManyToMany { entity: String, field: String },

    /// A field is both included and excluded.
    #[error("Field {entity}.{field} is both included and excluded")]
    ConflictingFieldOptions { entity: String, field: String },

    /// The entity has no registration in this registry.
    #[error("Not registered: {0}")]
    NotRegistered(String),

    /// Schema-level error.
    #[error(transparent)]
    Core(#[from] CoreError),
}
