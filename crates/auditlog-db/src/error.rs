//! Database error types for auditlog-db.

use auditlog_core::errors::CoreError;
use auditlog_registry::RegistryError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// No stored instance of the entity has this key.
    #[error("{entity} with key {pk} does not exist")]
    NotFound { entity: String, pk: String },

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Schema or value error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Registration lookup error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
