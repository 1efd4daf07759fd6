use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ExportArgs;
use crate::commands::shared::filter::log_filter;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct ExportResponse {
    path: String,
    written: usize,
}

/// Handle `auditlog export`.
pub async fn handle(
    args: &ExportArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let filter = log_filter(&args.filter, flags.limit)?;
    let written = ctx.service.export_jsonl(&args.path, &filter).await?;
    output(
        &ExportResponse {
            path: args.path.display().to_string(),
            written,
        },
        flags.format,
    )
}
