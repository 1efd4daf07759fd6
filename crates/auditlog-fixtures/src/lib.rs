//! # auditlog-fixtures
//!
//! Entities declared under the `auditlog_tests` app label, one per tracking
//! behaviour, and the two registries that track them:
//! - `auditlog`: every action, with per-entity include, exclude, mapping and
//!   mask options
//! - `m2m_only`: only many-to-many changes of `ManyRelatedModel.related`

pub mod models;
pub mod registration;

use auditlog_core::errors::CoreError;
use auditlog_core::schema::Schema;

pub use registration::{FixtureRegistries, register, register_into};

/// Resolve the fixture entities.
///
/// # Errors
///
/// Returns `CoreError` if the declarations do not resolve, which would be a
/// bug in the fixtures.
pub fn schema() -> Result<Schema, CoreError> {
    Schema::build(models::definitions())
}
