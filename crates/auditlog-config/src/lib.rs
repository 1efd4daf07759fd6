//! # auditlog-config
//!
//! Layered configuration loading for auditlog using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`AUDITLOG_*` prefix, `__` as separator)
//! 2. Project-level `.auditlog/config.toml`
//! 3. User-level `~/.config/auditlog/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `AUDITLOG_DATABASE__PATH` -> `database.path`,
//! `AUDITLOG_DISPLAY__TRUNCATE_LEN` -> `display.truncate_len`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use auditlog_config::AuditConfig;
//!
//! let config = AuditConfig::load_with_dotenv().expect("config");
//! println!("database: {}", config.database.path.display());
//! ```

mod database;
mod display;
mod error;
mod tracking;

pub use database::DatabaseConfig;
pub use display::DisplayConfig;
pub use error::ConfigError;
pub use tracking::TrackingConfig;

use auditlog_core::display::is_valid_format;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl AuditConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed and
    /// `ConfigError::InvalidValue` if a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// This is public so tests can inspect the figment directly or add
    /// additional providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".auditlog/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("AUDITLOG_").split("__"))
    }

    /// Reject values that would make display output meaningless.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.truncate_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "display.truncate_len".into(),
                reason: "must be greater than zero".into(),
            });
        }
        for (field, format) in [
            ("display.datetime_format", &self.display.datetime_format),
            ("display.date_format", &self.display.date_format),
            ("display.time_format", &self.display.time_format),
        ] {
            if format.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: "format string is empty".into(),
                });
            }
            if !is_valid_format(format) {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: format!("'{format}' is not a valid strftime format"),
                });
            }
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                reason: "path is empty".into(),
            });
        }
        Ok(())
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("auditlog").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.tracking.include_all_models);
        assert_eq!(config.display.truncate_len, 140);
    }

    #[test]
    fn unknown_strftime_specifier_is_rejected() {
        let mut config = AuditConfig::default();
        config.display.datetime_format = "%Q".into();
        let Err(ConfigError::InvalidValue { field, .. }) = config.validate() else {
            panic!("expected invalid datetime_format");
        };
        assert_eq!(field, "display.datetime_format");
    }

    #[test]
    fn zero_truncate_len_is_rejected() {
        let mut config = AuditConfig::default();
        config.display.truncate_len = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
