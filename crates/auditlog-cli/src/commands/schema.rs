use auditlog_core::log_entry::LogEntry;

use crate::cli::GlobalFlags;
use crate::output::output;

/// Handle `auditlog schema`.
pub fn handle(flags: &GlobalFlags) -> anyhow::Result<()> {
    let schema = schemars::schema_for!(LogEntry);
    output(&schema, flags.format)
}
