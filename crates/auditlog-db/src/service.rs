//! Service layer tracking changes to stored instances.
//!
//! `AuditService` wraps `AuditDb` (raw database access), the resolved
//! `Schema` and the registries deciding what is logged. All repo methods are
//! implemented as `impl AuditService`.

use std::sync::Arc;

use auditlog_core::display::DisplaySettings;
use auditlog_core::schema::Schema;
use auditlog_registry::AuditlogRegistry;

use crate::AuditDb;
use crate::error::DatabaseError;

/// Persists instances and records their history.
///
/// Every mutation method follows this protocol:
/// 1. Load the previous snapshot
/// 2. Write the new snapshot (or remove it)
/// 3. For each registry tracking the entity, diff old against new and
///    append a log entry
pub struct AuditService {
    db: AuditDb,
    schema: Arc<Schema>,
    registries: Vec<AuditlogRegistry>,
    display: DisplaySettings,
}

impl AuditService {
    /// Create a new service over a local database.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `schema` - The declared entities.
    /// * `registries` - Every registry whose registrations produce log entries.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(
        db_path: &str,
        schema: Arc<Schema>,
        registries: Vec<AuditlogRegistry>,
    ) -> Result<Self, DatabaseError> {
        let db = AuditDb::open_local(db_path).await?;
        Ok(Self::from_db(db, schema, registries))
    }

    /// Create from an existing `AuditDb`.
    #[must_use]
    pub fn from_db(db: AuditDb, schema: Arc<Schema>, registries: Vec<AuditlogRegistry>) -> Self {
        Self {
            db,
            schema,
            registries,
            display: DisplaySettings::default(),
        }
    }

    /// Replace the formatting used by `changes_display`.
    #[must_use]
    pub fn with_display(mut self, display: DisplaySettings) -> Self {
        self.display = display;
        self
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &AuditDb {
        &self.db
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn registries(&self) -> &[AuditlogRegistry] {
        &self.registries
    }

    /// Look up a registry by name.
    #[must_use]
    pub fn registry(&self, name: &str) -> Option<&AuditlogRegistry> {
        self.registries.iter().find(|r| r.name() == name)
    }

    #[must_use]
    pub const fn display_settings(&self) -> &DisplaySettings {
        &self.display
    }
}
