//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SPARKCACHE_*)
//! 2. TOML config file (if SPARKCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Bumping `static_cache` / `runtime_cache` is the only way to invalidate
//! caches across deployments.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SPARKCACHE_*)
/// 2. TOML config file (if SPARKCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SPARKCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the proxied site is served from, e.g. `https://example.com`.
    ///
    /// Requests to this origin are treated as same-origin static assets.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the static generation (versioned).
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the runtime generation (versioned).
    #[serde(default = "default_runtime_cache")]
    pub runtime_cache: String,

    /// Critical assets preloaded at install time, relative to `origin`.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Regular expressions selecting external URLs served stale-while-revalidate.
    #[serde(default = "default_runtime_patterns")]
    pub runtime_patterns: Vec<String>,

    /// Document served to navigations when the network is unreachable.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: Option<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fetches slower than this are logged as slow requests.
    #[serde(default = "default_slow_request_ms")]
    pub slow_request_ms: u64,

    /// Activate immediately after a successful install instead of waiting
    /// for a SKIP_WAITING message.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sparkcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_static_cache() -> String {
    "harness-the-spark-v1.0.0".into()
}

fn default_runtime_cache() -> String {
    "harness-the-spark-runtime-v1.0.0".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/styles.css",
        "/script.js",
        "/manifest.json",
        "/favicon.ico",
        "/favicon.svg",
        "/apple-touch-icon.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_runtime_patterns() -> Vec<String> {
    [
        r"^https://cdnjs\.cloudflare\.com/",
        r"^https://fonts\.googleapis\.com/",
        r"^https://fonts\.gstatic\.com/",
        r"^https://images\.unsplash\.com/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_offline_fallback() -> Option<String> {
    Some("/offline.html".into())
}

fn default_user_agent() -> String {
    "sparkcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_slow_request_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            static_cache: default_static_cache(),
            runtime_cache: default_runtime_cache(),
            manifest: default_manifest(),
            runtime_patterns: default_runtime_patterns(),
            offline_fallback: default_offline_fallback(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            slow_request_ms: default_slow_request_ms(),
            skip_waiting: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Slow-request threshold as Duration.
    pub fn slow_request(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SPARKCACHE_`
    /// 2. TOML file from `SPARKCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// List-valued settings use TOML array syntax in the environment,
    /// e.g. `SPARKCACHE_MANIFEST='["/", "/index.html"]'`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SPARKCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SPARKCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./sparkcache.sqlite"));
        assert_eq!(config.static_cache, "harness-the-spark-v1.0.0");
        assert_eq!(config.runtime_cache, "harness-the-spark-runtime-v1.0.0");
        assert_eq!(config.manifest.len(), 8);
        assert_eq!(config.manifest[0], "/");
        assert_eq!(config.runtime_patterns.len(), 4);
        assert_eq!(config.offline_fallback.as_deref(), Some("/offline.html"));
        assert_eq!(config.user_agent, "sparkcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.slow_request_ms, 2_000);
        assert!(config.skip_waiting);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(5_000));
        assert_eq!(config.slow_request(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = r#"
            origin = "https://harnessthespark.com"
            static_cache = "site-v2"
            manifest = ["/", "/about.html"]
            skip_waiting = false
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.origin, "https://harnessthespark.com");
        assert_eq!(config.static_cache, "site-v2");
        assert_eq!(config.manifest, vec!["/".to_string(), "/about.html".to_string()]);
        assert!(!config.skip_waiting);
        assert_eq!(config.runtime_cache, "harness-the-spark-runtime-v1.0.0");
    }
}
