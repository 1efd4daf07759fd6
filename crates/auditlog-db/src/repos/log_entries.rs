//! Log entry repository.
//!
//! Append-only history records, queried per object or with dynamic filters.

use auditlog_core::changes::Changes;
use auditlog_core::display::{DisplayDict, changes_display_dict};
use auditlog_core::enums::LogAction;
use auditlog_core::errors::CoreError;
use auditlog_core::log_entry::{LogEntry, NewLogEntry};
use auditlog_core::tracking::TrackingOptions;
use auditlog_core::value::PkValue;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_optional_object};
use crate::service::AuditService;

const ENTRY_COLUMNS: &str = "id, content_type, object_pk, object_id, object_repr, action, changes, \
                             actor, remote_addr, cid, additional_data, timestamp";

/// Filter criteria for log queries.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub content_type: Option<String>,
    pub object_pk: Option<String>,
    pub action: Option<LogAction>,
    pub actor: Option<String>,
    /// Only entries strictly older than this.
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Fixed-width timestamps, so text order is time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_entry(row: &libsql::Row) -> Result<LogEntry, DatabaseError> {
    let changes: Changes = serde_json::from_str(&row.get::<String>(6)?)
        .map_err(|e| DatabaseError::Query(format!("Invalid changes in log entry: {e}")))?;
    Ok(LogEntry {
        id: row.get::<i64>(0)?,
        content_type: row.get::<String>(1)?,
        object_pk: row.get::<String>(2)?,
        object_id: row.get::<Option<i64>>(3)?,
        object_repr: row.get::<String>(4)?,
        action: LogAction::from_code(row.get::<i64>(5)?)?,
        changes,
        actor: get_opt_string(row, 7)?,
        remote_addr: get_opt_string(row, 8)?,
        cid: get_opt_string(row, 9)?,
        additional_data: parse_optional_object(get_opt_string(row, 10)?.as_deref())?,
        timestamp: parse_datetime(&row.get::<String>(11)?)?,
    })
}

impl AuditService {
    /// Append a log entry, stamping it with the current time at microsecond
    /// precision, the precision it is stored with.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the INSERT fails.
    pub async fn append_entry(&self, entry: NewLogEntry) -> Result<LogEntry, DatabaseError> {
        let timestamp = Utc::now().trunc_subsecs(6);
        let changes =
            serde_json::to_string(&entry.changes).map_err(|e| DatabaseError::Other(e.into()))?;
        let additional_data = entry
            .additional_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Other(e.into()))?;

        let mut rows = self
            .db()
            .query(
                "INSERT INTO log_entries (content_type, object_pk, object_id, object_repr, action,
                                          changes, actor, remote_addr, cid, additional_data, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING id",
                libsql::params![
                    entry.content_type.as_str(),
                    entry.object_pk.as_str(),
                    entry.object_id,
                    entry.object_repr.as_str(),
                    entry.action.code(),
                    changes,
                    entry.actor.as_deref(),
                    entry.remote_addr.as_deref(),
                    entry.cid.as_deref(),
                    additional_data,
                    format_timestamp(&timestamp)
                ],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        let id = row.get::<i64>(0)?;

        Ok(LogEntry {
            id,
            content_type: entry.content_type,
            object_pk: entry.object_pk,
            object_id: entry.object_id,
            object_repr: entry.object_repr,
            action: entry.action,
            changes: entry.changes,
            actor: entry.actor,
            remote_addr: entry.remote_addr,
            cid: entry.cid,
            additional_data: entry.additional_data,
            timestamp,
        })
    }

    /// Load one entry by id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NoResult` if there is no such entry.
    pub async fn get_entry(&self, id: i64) -> Result<LogEntry, DatabaseError> {
        let mut rows = self
            .db()
            .query(
                &format!("SELECT {ENTRY_COLUMNS} FROM log_entries WHERE id = ?1"),
                [id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        row_to_entry(&row)
    }

    /// Query log entries with optional filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_log(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, DatabaseError> {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(ref ct) = filter.content_type {
            params.push(libsql::Value::Text(ct.clone()));
            conditions.push(format!("content_type = ?{}", params.len()));
        }
        if let Some(ref pk) = filter.object_pk {
            params.push(libsql::Value::Text(pk.clone()));
            conditions.push(format!("object_pk = ?{}", params.len()));
        }
        if let Some(action) = filter.action {
            params.push(libsql::Value::Integer(action.code()));
            conditions.push(format!("action = ?{}", params.len()));
        }
        if let Some(ref actor) = filter.actor {
            params.push(libsql::Value::Text(actor.clone()));
            conditions.push(format!("actor = ?{}", params.len()));
        }
        if let Some(ref before) = filter.before {
            params.push(libsql::Value::Text(format_timestamp(before)));
            conditions.push(format!("timestamp < ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let limit_clause = filter
            .limit
            .map_or_else(String::new, |limit| format!("LIMIT {limit}"));
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM log_entries {where_clause} ORDER BY id DESC {limit_clause}"
        );

        let mut rows = self
            .db()
            .query(&sql, libsql::params_from_iter(params))
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    /// History of one instance, newest first.
    ///
    /// Integer keys are matched on the indexed `object_id` column unless the
    /// entity's history field turns that off; other keys match `object_pk`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entity is unknown or the query fails.
    pub async fn history(&self, entity: &str, pk: &PkValue) -> Result<Vec<LogEntry>, DatabaseError> {
        let entity = self.schema().entity(entity)?;
        let indexable = entity.history().is_none_or(|h| h.pk_indexable);

        let (column, key) = match (indexable, pk.as_indexable()) {
            (true, Some(id)) => ("object_id", libsql::Value::Integer(id)),
            _ => ("object_pk", libsql::Value::Text(pk.to_string())),
        };
        let mut rows = self
            .db()
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM log_entries
                     WHERE content_type = ?1 AND {column} = ?2
                     ORDER BY id DESC"
                ),
                libsql::params![entity.content_type(), key],
            )
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    /// Remove every entry of one object. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the DELETE fails.
    pub async fn delete_history(
        &self,
        content_type: &str,
        object_pk: &str,
    ) -> Result<u64, DatabaseError> {
        self.db()
            .execute(
                "DELETE FROM log_entries WHERE content_type = ?1 AND object_pk = ?2",
                [content_type, object_pk],
            )
            .await
    }

    /// Remove entries older than `before`, or all entries. Returns how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the DELETE fails.
    pub async fn flush(&self, before: Option<DateTime<Utc>>) -> Result<u64, DatabaseError> {
        let removed = match before {
            Some(before) => {
                self.db()
                    .execute(
                        "DELETE FROM log_entries WHERE timestamp < ?1",
                        [format_timestamp(&before)],
                    )
                    .await?
            }
            None => self.db().execute("DELETE FROM log_entries", ()).await?,
        };
        tracing::debug!(removed, "flushed log entries");
        Ok(removed)
    }

    /// Human-readable changes of `entry`, labelled with the options of the
    /// first registry that tracks its entity.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if no declared entity has the entry's
    /// content type.
    pub fn changes_display(&self, entry: &LogEntry) -> Result<DisplayDict, DatabaseError> {
        let entity = self
            .schema()
            .by_content_type(&entry.content_type)
            .ok_or_else(|| CoreError::UnknownEntity(entry.content_type.clone()))?;
        let options = self
            .registries()
            .iter()
            .find_map(|r| r.get_model_fields(entity.name()))
            .cloned()
            .unwrap_or_else(TrackingOptions::default);
        Ok(changes_display_dict(
            &entry.changes,
            entity,
            &options,
            self.display_settings(),
        ))
    }
}
