use auditlog_core::enums::LogAction;
use auditlog_db::repos::log_entries::LogFilter;

use crate::cli::root_commands::LogArgs;
use crate::commands::shared::parse::parse_enum;

/// Build a `LogFilter` from command-line filters.
pub fn log_filter(args: &LogArgs, limit: Option<u32>) -> anyhow::Result<LogFilter> {
    Ok(LogFilter {
        content_type: args.content_type.clone(),
        object_pk: args.object_pk.clone(),
        action: args
            .action
            .as_deref()
            .map(|value| parse_enum::<LogAction>(value, "action"))
            .transpose()?,
        actor: args.actor.clone(),
        before: None,
        limit,
    })
}
