//! Which entities and fields are tracked by default.

use auditlog_registry::AllModelsOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Register every declared entity with default options.
    #[serde(default)]
    pub include_all_models: bool,

    /// Entities skipped by `include_all_models`.
    #[serde(default)]
    pub exclude_models: Vec<String>,

    /// Let `include_all_models` also register many-to-many through entities.
    #[serde(default)]
    pub include_auto_created: bool,

    /// Field names excluded from every registration.
    #[serde(default)]
    pub exclude_tracking_fields: Vec<String>,

    /// Field names masked in every registration.
    #[serde(default)]
    pub mask_tracking_fields: Vec<String>,
}

impl TrackingConfig {
    /// Options for `AuditlogRegistry::register_all`.
    #[must_use]
    pub fn all_models_options(&self) -> AllModelsOptions {
        AllModelsOptions {
            exclude_models: self.exclude_models.iter().cloned().collect(),
            include_auto_created: self.include_auto_created,
        }
    }
}
