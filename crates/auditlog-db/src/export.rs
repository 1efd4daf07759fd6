//! JSONL export of log entries.
//!
//! One entry per line, oldest first, so an export can be replayed or
//! appended to in order.

use std::path::Path;

use auditlog_core::log_entry::LogEntry;

use crate::error::DatabaseError;
use crate::repos::log_entries::LogFilter;
use crate::service::AuditService;

impl AuditService {
    /// Write the entries matching `filter` to `path` as JSON lines.
    /// Returns how many entries were written.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or the file cannot be written.
    pub async fn export_jsonl(
        &self,
        path: &Path,
        filter: &LogFilter,
    ) -> Result<usize, DatabaseError> {
        let mut entries = self.query_log(filter).await?;
        entries.reverse();
        serde_jsonlines::write_json_lines(path, &entries)
            .map_err(|e| DatabaseError::Other(e.into()))?;
        tracing::debug!(path = %path.display(), count = entries.len(), "exported log entries");
        Ok(entries.len())
    }
}

/// Read entries back from a JSONL export.
///
/// # Errors
///
/// Returns `DatabaseError` if the file cannot be read or a line is not a
/// valid entry.
pub fn read_jsonl(path: &Path) -> Result<Vec<LogEntry>, DatabaseError> {
    serde_jsonlines::json_lines(path)
        .map_err(|e| DatabaseError::Other(e.into()))?
        .collect::<std::io::Result<Vec<LogEntry>>>()
        .map_err(|e| DatabaseError::Other(e.into()))
}
