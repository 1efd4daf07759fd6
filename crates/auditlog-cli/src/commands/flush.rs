use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::FlushArgs;
use crate::commands::shared::parse::parse_date;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct FlushResponse {
    removed: u64,
    before: Option<DateTime<Utc>>,
}

/// Handle `auditlog flush`.
pub async fn handle(args: &FlushArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let before = args
        .before
        .as_deref()
        .map(|value| parse_date(value, "before"))
        .transpose()?;

    if !args.yes {
        tracing::warn!(?before, "flush skipped without confirmation");
        anyhow::bail!("refusing to delete log entries without --yes");
    }

    let removed = ctx.service.flush(before).await?;
    output(&FlushResponse { removed, before }, flags.format)
}
