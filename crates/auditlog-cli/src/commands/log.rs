use auditlog_core::log_entry::LogEntry;
use serde::Serialize;

use crate::cli::root_commands::LogArgs;
use crate::cli::{GlobalFlags, OutputFormat};
use crate::commands::shared::filter::log_filter;
use crate::commands::shared::limit::effective_limit;
use crate::context::AppContext;
use crate::output::output;

/// One table row per log entry, with changes summarized on a single line.
#[derive(Debug, Serialize)]
pub struct EntryRow {
    pub id: i64,
    pub timestamp: String,
    pub action: &'static str,
    pub content_type: String,
    pub object_pk: String,
    pub object_repr: String,
    pub actor: Option<String>,
    pub changes: String,
}

impl From<&LogEntry> for EntryRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            action: entry.action.as_str(),
            content_type: entry.content_type.clone(),
            object_pk: entry.object_pk.clone(),
            object_repr: entry.object_repr.clone(),
            actor: entry.actor.clone(),
            changes: entry.changes_summary(),
        }
    }
}

/// Print entries, as table rows when a table is requested.
pub fn output_entries(entries: &[LogEntry], flags: &GlobalFlags) -> anyhow::Result<()> {
    if flags.format == OutputFormat::Table {
        let rows = entries.iter().map(EntryRow::from).collect::<Vec<_>>();
        output(&rows, flags.format)
    } else {
        output(&entries, flags.format)
    }
}

/// Handle `auditlog log`.
pub async fn handle(args: &LogArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let limit = effective_limit(None, flags.limit, 50);
    let filter = log_filter(args, Some(limit))?;
    let entries = ctx.service.query_log(&filter).await?;
    tracing::debug!(count = entries.len(), "log entries fetched");
    output_entries(&entries, flags)
}
