use anyhow::Context;
use auditlog_core::display::DisplayDict;
use auditlog_core::log_entry::LogEntry;
use serde::Serialize;

use crate::cli::root_commands::HistoryArgs;
use crate::cli::{GlobalFlags, OutputFormat};
use crate::commands::log::output_entries;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct HistoryItem {
    #[serde(flatten)]
    entry: LogEntry,
    changes_display: DisplayDict,
}

/// Handle `auditlog history`.
pub async fn handle(
    args: &HistoryArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let entity = ctx
        .service
        .schema()
        .by_content_type(&args.content_type)
        .with_context(|| format!("unknown content type '{}'", args.content_type))?;
    let pk = entity.parse_pk(&args.pk)?;

    let mut entries = ctx.service.history(entity.name(), &pk).await?;
    if let Some(limit) = flags.limit {
        entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    if flags.format == OutputFormat::Table {
        return output_entries(&entries, flags);
    }

    let items = entries
        .into_iter()
        .map(|entry| -> anyhow::Result<HistoryItem> {
            let changes_display = ctx.service.changes_display(&entry)?;
            Ok(HistoryItem {
                entry,
                changes_display,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    output(&items, flags.format)
}
