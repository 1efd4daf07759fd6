use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Top-level commands of the `auditlog` binary.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// List log entries, newest first.
    Log(LogArgs),
    /// Show the history of one instance with display values.
    History(HistoryArgs),
    /// Delete log entries.
    Flush(FlushArgs),
    /// Write log entries to a JSON Lines file, oldest first.
    Export(ExportArgs),
    /// Dump the JSON schema of a log entry.
    Schema,
}

/// Filters shared by `auditlog log` and `auditlog export`.
#[derive(Clone, Debug, Default, Args)]
pub struct LogArgs {
    /// Content type, e.g. `auditlog_tests.simplemodel`
    #[arg(long)]
    pub content_type: Option<String>,
    /// Primary key as text
    #[arg(long)]
    pub object_pk: Option<String>,
    /// create, update, delete or access
    #[arg(long)]
    pub action: Option<String>,
    #[arg(long)]
    pub actor: Option<String>,
}

/// Arguments for `auditlog history`.
#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    pub content_type: String,
    pub pk: String,
}

/// Arguments for `auditlog flush`.
#[derive(Clone, Debug, Args)]
pub struct FlushArgs {
    /// Only delete entries older than this date (YYYY-MM-DD, UTC midnight)
    #[arg(long)]
    pub before: Option<String>,
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for `auditlog export`.
#[derive(Clone, Debug, Args)]
pub struct ExportArgs {
    pub path: PathBuf,
    #[command(flatten)]
    pub filter: LogArgs,
}
