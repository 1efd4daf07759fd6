use std::sync::Arc;

use anyhow::Context;
use auditlog_config::{AuditConfig, TrackingConfig};
use auditlog_core::display::DisplaySettings;
use auditlog_core::schema::Schema;
use auditlog_db::service::AuditService;
use auditlog_fixtures::registration::DEFAULT_REGISTRY;
use auditlog_fixtures::{FixtureRegistries, register_into};
use auditlog_registry::AuditlogRegistry;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: AuditService,
}

impl AppContext {
    /// Open the configured database over the fixture schema and registries.
    pub async fn init(config: &AuditConfig) -> anyhow::Result<Self> {
        let schema = auditlog_fixtures::schema().context("failed to resolve fixture schema")?;
        let registries = build_registries(&schema, &config.tracking)?;

        if !config.database.is_in_memory()
            && let Some(parent) = config.database.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let db_path = config.database.path.to_string_lossy();
        let service = AuditService::new_local(&db_path, Arc::new(schema), registries)
            .await
            .with_context(|| format!("failed to open audit database at {db_path}"))?
            .with_display(DisplaySettings::from(&config.display));

        Ok(Self { service })
    }
}

/// The default registry carries the global tracking fields and, with
/// `include_all_models`, every entity not explicitly excluded.
pub fn build_registries(
    schema: &Schema,
    tracking: &TrackingConfig,
) -> anyhow::Result<Vec<AuditlogRegistry>> {
    let mut auditlog = AuditlogRegistry::new(DEFAULT_REGISTRY).with_global_fields(
        tracking.exclude_tracking_fields.iter().cloned(),
        tracking.mask_tracking_fields.iter().cloned(),
    );

    for name in &tracking.exclude_models {
        if schema.get(name).is_none() {
            tracing::warn!(entity = %name, "exclude_models names an unknown entity");
        }
    }

    if tracking.include_all_models {
        let count = auditlog.register_all(schema, &tracking.all_models_options())?;
        tracing::debug!(count, "registered all models");
    }

    let FixtureRegistries { auditlog, m2m_only } = register_into(schema, auditlog)?;
    Ok(vec![auditlog, m2m_only])
}
