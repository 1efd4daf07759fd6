use std::path::PathBuf;

use auditlog_config::AuditConfig;

use crate::cli::GlobalFlags;

/// Load layered configuration (reading `.env` first) and apply CLI overrides.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<AuditConfig> {
    let mut config = AuditConfig::load_with_dotenv()?;
    apply_overrides(&mut config, flags);
    Ok(config)
}

fn apply_overrides(config: &mut AuditConfig, flags: &GlobalFlags) {
    if let Some(database) = &flags.database {
        tracing::debug!(%database, "database path overridden from command line");
        config.database.path = PathBuf::from(database);
    }
}
