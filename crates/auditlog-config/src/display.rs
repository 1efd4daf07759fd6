//! Formatting of displayed changes.

use auditlog_core::display::DisplaySettings;
use serde::{Deserialize, Serialize};

const fn default_truncate_len() -> usize {
    140
}

fn default_datetime_format() -> String {
    DisplaySettings::default().datetime_format
}

fn default_date_format() -> String {
    DisplaySettings::default().date_format
}

fn default_time_format() -> String {
    DisplaySettings::default().time_format
}

/// chrono format strings and the truncation length for display values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_truncate_len")]
    pub truncate_len: usize,

    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default = "default_time_format")]
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            truncate_len: default_truncate_len(),
            datetime_format: default_datetime_format(),
            date_format: default_date_format(),
            time_format: default_time_format(),
        }
    }
}

impl From<&DisplayConfig> for DisplaySettings {
    fn from(config: &DisplayConfig) -> Self {
        Self {
            truncate_len: config.truncate_len,
            datetime_format: config.datetime_format.clone(),
            date_format: config.date_format.clone(),
            time_format: config.time_format.clone(),
        }
    }
}
