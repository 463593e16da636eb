//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `upstream_base_url` is not an absolute http(s) URL
    /// - `refresh_interval_secs` is 0
    /// - `forget_interval_secs` does not exceed `refresh_interval_secs`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or any pagination field name is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.upstream_base_url) {
            Ok(base) if matches!(base.scheme(), "http" | "https") => {}
            Ok(base) => {
                return Err(ConfigError::Invalid {
                    field: "upstream_base_url".into(),
                    reason: format!("unsupported scheme: {}", base.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "upstream_base_url".into(), reason: e.to_string() });
            }
        }

        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.forget_interval_secs <= self.refresh_interval_secs {
            return Err(ConfigError::Invalid {
                field: "forget_interval_secs".into(),
                reason: "must exceed refresh_interval_secs".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (field, value) in [
            ("records_field", &self.records_field),
            ("token_field", &self.token_field),
            ("token_param", &self.token_param),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }

        if self.control_params.iter().any(|p| p == &self.token_param) {
            return Err(ConfigError::Invalid {
                field: "control_params".into(),
                reason: format!("must not contain the continuation parameter '{}'", self.token_param),
            });
        }

        if self.upstream_token.is_none() {
            tracing::warn!("upstream_token is not set; cache misses will fail until it is configured");
        }

        Ok(())
    }
}
