//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITE_CACHE_*)
//! 2. TOML config file (if SITE_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{CachePolicy, PaginationShape};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITE_CACHE_*)
/// 2. TOML config file (if SITE_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base address of the upstream REST API.
    ///
    /// Set via SITE_CACHE_UPSTREAM_BASE_URL environment variable.
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    /// Bearer credential sent to the upstream API.
    ///
    /// Set via SITE_CACHE_UPSTREAM_TOKEN environment variable.
    /// Required only when a live fetch happens.
    #[serde(default)]
    pub upstream_token: Option<String>,

    /// Directory holding one snapshot artifact per site.
    ///
    /// Set via SITE_CACHE_SNAPSHOT_DIR environment variable.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Age in seconds after which a hit schedules a background refresh.
    ///
    /// Set via SITE_CACHE_REFRESH_INTERVAL_SECS environment variable.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Age in seconds after which the forgetting pass evicts an entry.
    ///
    /// Set via SITE_CACHE_FORGET_INTERVAL_SECS environment variable.
    #[serde(default = "default_forget_interval_secs")]
    pub forget_interval_secs: u64,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via SITE_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for upstream requests.
    ///
    /// Set via SITE_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Payload field holding the record collection.
    #[serde(default = "default_records_field")]
    pub records_field: String,

    /// Payload field holding the continuation token.
    #[serde(default = "default_token_field")]
    pub token_field: String,

    /// Query parameter that carries a continuation token on requests.
    #[serde(default = "default_token_param")]
    pub token_param: String,

    /// Cache-control query parameters stripped from inbound identifiers.
    ///
    /// Set via SITE_CACHE_CONTROL_PARAMS environment variable (comma-separated).
    #[serde(default = "default_control_params", deserialize_with = "deserialize_list")]
    pub control_params: Vec<String>,
}

fn default_upstream_base_url() -> String {
    "https://api.airtable.com".into()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("./site-cache")
}

fn default_refresh_interval_secs() -> u64 {
    15 * 60
}

fn default_forget_interval_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "site-cache/0.1".into()
}

fn default_records_field() -> String {
    "records".into()
}

fn default_token_field() -> String {
    "offset".into()
}

fn default_token_param() -> String {
    "offset".into()
}

fn default_control_params() -> Vec<String> {
    vec!["site".into(), "refresh".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: default_upstream_base_url(),
            upstream_token: None,
            snapshot_dir: default_snapshot_dir(),
            refresh_interval_secs: default_refresh_interval_secs(),
            forget_interval_secs: default_forget_interval_secs(),
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            records_field: default_records_field(),
            token_field: default_token_field(),
            token_param: default_token_param(),
            control_params: default_control_params(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_token", &self.upstream_token.as_ref().map(|_| "<redacted>"))
            .field("snapshot_dir", &self.snapshot_dir)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("forget_interval_secs", &self.forget_interval_secs)
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .field("records_field", &self.records_field)
            .field("token_field", &self.token_field)
            .field("token_param", &self.token_param)
            .field("control_params", &self.control_params)
            .finish()
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Refresh and forget intervals plus the upstream timeout.
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            forget_interval: Duration::from_secs(self.forget_interval_secs),
            fetch_timeout: self.timeout(),
        }
    }

    /// Field and parameter names that describe upstream pagination.
    pub fn pagination_shape(&self) -> PaginationShape {
        PaginationShape {
            records_field: self.records_field.clone(),
            token_field: self.token_field.clone(),
            token_param: self.token_param.clone(),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITE_CACHE_`
    /// 2. TOML file from `SITE_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITE_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITE_CACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the upstream credential is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the token is not set.
    pub fn require_upstream_token(&self) -> Result<&str, ConfigError> {
        self.upstream_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "upstream_token".into(),
                hint: "Set SITE_CACHE_UPSTREAM_TOKEN environment variable".into(),
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

/// Accept both `SITE_CACHE_CONTROL_PARAMS=site,refresh` and a TOML array.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(value) => vec![value],
        StringOrList::Many(values) => values,
    };
    Ok(split_list(&values))
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.upstream_base_url, "https://api.airtable.com");
        assert_eq!(config.snapshot_dir, PathBuf::from("./site-cache"));
        assert_eq!(config.refresh_interval_secs, 900);
        assert_eq!(config.forget_interval_secs, 604_800);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.user_agent, "site-cache/0.1");
        assert_eq!(config.records_field, "records");
        assert_eq!(config.token_field, "offset");
        assert_eq!(config.token_param, "offset");
        assert_eq!(config.control_params, vec!["site".to_string(), "refresh".to_string()]);
        assert!(config.upstream_token.is_none());
    }

    #[test]
    fn test_cache_policy_durations() {
        let config = AppConfig::default();
        let policy = config.cache_policy();
        assert_eq!(policy.refresh_interval, Duration::from_secs(15 * 60));
        assert_eq!(policy.forget_interval, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(policy.fetch_timeout, Duration::from_millis(20_000));
    }

    #[test]
    fn test_require_upstream_token_missing() {
        let config = AppConfig::default();
        let result = config.require_upstream_token();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));

        let config = AppConfig { upstream_token: Some(String::new()), ..Default::default() };
        assert!(config.require_upstream_token().is_err());
    }

    #[test]
    fn test_require_upstream_token_present() {
        let config = AppConfig { upstream_token: Some("key-123".into()), ..Default::default() };
        assert_eq!(config.require_upstream_token().unwrap(), "key-123");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AppConfig { upstream_token: Some("key-secret".into()), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("key-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_control_params_from_string_or_list() {
        let config: AppConfig = serde_json::from_str(r#"{"control_params": "site,refresh,nocache"}"#).unwrap();
        assert_eq!(config.control_params, vec!["site", "refresh", "nocache"]);

        let config: AppConfig = serde_json::from_str(r#"{"control_params": ["site", "refresh"]}"#).unwrap();
        assert_eq!(config.control_params, vec!["site", "refresh"]);
    }

    #[test]
    fn test_split_list() {
        let values = vec!["site, refresh".to_string(), "nocache".to_string(), " ".to_string()];
        assert_eq!(split_list(&values), vec!["site", "refresh", "nocache"]);
    }
}
