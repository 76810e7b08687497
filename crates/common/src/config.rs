pub use crate::models::SourceConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

// Default constants
pub const DEFAULT_MAX_RESULTS: usize = 10_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 100;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Result cache settings: a default TTL overlaid by per-table TTLs.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl_ms")]
    pub default_ttl_ms: u64,

    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    #[serde(default)]
    pub per_table_ttl: HashMap<String, u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            default_ttl_ms: default_cache_ttl_ms(),
            max_size: default_cache_max_size(),
            per_table_ttl: HashMap::new(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

fn default_cache_max_size() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

/// Executor settings consumed by the query pipeline.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ExecutorSettings {
    /// Row cap applied when a query carries no LIMIT.
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Optional wall-clock bound on a whole query, in seconds.
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            query_timeout_secs: None,
        }
    }
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

/// Top-level application configuration.
///
/// Plugin-specific settings (credentials, regions, contexts) pass through
/// the `sources` entries opaquely; the engine never interprets them.
#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,

    #[serde(default)]
    #[validate(nested)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl AppConfig {
    /// Load configuration from an optional file overlaid with
    /// `SCOUT`-prefixed environment variables (`SCOUT_CACHE__ENABLED`
    /// maps to `cache.enabled`).
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("SCOUT")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.default_ttl_ms, DEFAULT_CACHE_TTL_MS);
        assert_eq!(config.executor.default_max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::from_file("/nonexistent/scout.yaml").unwrap();
        assert_eq!(config.cache.max_size, DEFAULT_CACHE_MAX_SIZE);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_per_table_ttl_deserializes() {
        let yaml: AppConfig = serde_json::from_value(serde_json::json!({
            "cache": {
                "per_table_ttl": { "deployments": 60000, "instances": 3600000 }
            }
        }))
        .unwrap();
        assert_eq!(yaml.cache.per_table_ttl["deployments"], 60_000);
        assert_eq!(yaml.cache.per_table_ttl["instances"], 3_600_000);
    }
}
