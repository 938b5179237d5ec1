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

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `slow_request_ms` is 0
    /// - `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - the generation names are equal
    ///
    /// Returns `ConfigError::Missing` if a generation name or the manifest is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.slow_request_ms == 0 {
            return Err(invalid("slow_request_ms", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        match url::Url::parse(&self.origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            _ => return Err(invalid("origin", "must be an absolute http(s) URL")),
        }

        if self.static_cache.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "static_cache".into(),
                hint: "Set SPARKCACHE_STATIC_CACHE to a versioned name".into(),
            });
        }
        if self.runtime_cache.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "runtime_cache".into(),
                hint: "Set SPARKCACHE_RUNTIME_CACHE to a versioned name".into(),
            });
        }
        if self.static_cache == self.runtime_cache {
            return Err(invalid("runtime_cache", "must differ from static_cache"));
        }

        if self.manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "manifest".into(),
                hint: "List at least one asset to preload".into(),
            });
        }

        if self.runtime_patterns.is_empty() {
            tracing::debug!("runtime_patterns is empty; no external origin will be cached");
        }

        Ok(())
    }
}
