use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::Deserialize;
use sf_core::types::{DEFAULT_RULE_ID_START, MAX_DYNAMIC_RULES};

use crate::error::ConfigError;

/// Longest accepted refresh period: one year.
const MAX_UPDATE_INTERVAL_HOURS: u64 = 24 * 365;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// JSON manifest describing the available filter lists.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Key-value file holding list metadata and compiled rules.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// File the active dynamic rule set is written to.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: u64,

    #[serde(default = "default_max_dynamic_rules")]
    pub max_dynamic_rules: usize,

    #[serde(default = "default_rule_id_start")]
    pub rule_id_start: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            cache_path: default_cache_path(),
            output_path: default_output_path(),
            update_interval_hours: default_update_interval_hours(),
            max_dynamic_rules: default_max_dynamic_rules(),
            rule_id_start: default_rule_id_start(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    /// Parse settings. A rule budget above what the engine accepts is
    /// lowered to the engine limit.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = toml::from_str(content)?;
        if settings.max_dynamic_rules > MAX_DYNAMIC_RULES {
            warn!(
                "max_dynamic_rules {} exceeds the engine limit, using {}",
                settings.max_dynamic_rules, MAX_DYNAMIC_RULES
            );
            settings.max_dynamic_rules = MAX_DYNAMIC_RULES;
        }
        Ok(settings)
    }

    /// Refresh period, between one hour and one year.
    pub fn update_interval(&self) -> Duration {
        let hours = self.update_interval_hours.clamp(1, MAX_UPDATE_INTERVAL_HOURS);
        Duration::from_secs(hours.saturating_mul(60 * 60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Defaults
fn default_manifest_path() -> PathBuf {
    PathBuf::from("filterLists.json")
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("shieldforge-cache.json")
}
fn default_output_path() -> PathBuf {
    PathBuf::from("dynamic-rules.json")
}
fn default_update_interval_hours() -> u64 {
    4
}
fn default_max_dynamic_rules() -> usize {
    MAX_DYNAMIC_RULES
}
fn default_rule_id_start() -> u32 {
    DEFAULT_RULE_ID_START
}
fn default_user_agent() -> String {
    format!("ShieldForge/{}", env!("CARGO_PKG_VERSION"))
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
