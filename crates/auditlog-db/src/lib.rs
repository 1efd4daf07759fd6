//! # auditlog-db
//!
//! libSQL storage and change tracking for auditlog.
//!
//! Stores instance snapshots of declared entities, many-to-many links (as
//! through-entity instances) and the history records produced by every
//! registry that tracks them. `AuditService` is the tracking engine; every
//! mutation it performs diffs the previous snapshot against the next one and
//! appends log entries.
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29).

pub mod context;
pub mod error;
pub mod export;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod service;
mod tracking;

use error::DatabaseError;
use libsql::Builder;
use libsql::params::IntoParams;

/// Database handle for snapshots, sequences and log entries.
pub struct AuditDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl AuditDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let audit_db = Self { db, conn };
        audit_db.run_migrations().await?;
        tracing::debug!(path, "opened audit database");
        Ok(audit_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Execute a statement, returning the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the statement fails.
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64, DatabaseError> {
        Ok(self.conn.execute(sql, params).await?)
    }

    /// Run a query.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the query fails.
    pub async fn query(
        &self,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<libsql::Rows, DatabaseError> {
        Ok(self.conn.query(sql, params).await?)
    }

    /// Next value of the auto-increment counter `name`, starting at 1.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the upsert fails or returns no rows.
    pub async fn next_sequence(&self, name: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .query(
                "INSERT INTO sequences (entity, value) VALUES (?1, 1)
                 ON CONFLICT(entity) DO UPDATE SET value = value + 1
                 RETURNING value",
                [name],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<i64>(0)?)
    }

    /// Raise the counter `name` to at least `value`, so explicitly keyed
    /// rows are never handed out again.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the upsert fails.
    pub async fn bump_sequence(&self, name: &str, value: i64) -> Result<(), DatabaseError> {
        self.execute(
            "INSERT INTO sequences (entity, value) VALUES (?1, ?2)
             ON CONFLICT(entity) DO UPDATE SET value = MAX(value, excluded.value)",
            libsql::params![name, value],
        )
        .await?;
        Ok(())
    }
}
