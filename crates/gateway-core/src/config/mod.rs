//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `GATEWAY_CONFIG` env var
//! 3. **Environment variables**: `GATEWAY__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`CacheConfig`]: Cache read timeout and memory store bounds
//! - [`LimitsConfig`]: Account blacklist, custom JSON size, and batch size limits
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [cache]
//! read_timeout_ms = 500
//! memory_max_ttl_seconds = 180
//!
//! [limits]
//! accounts_blacklist = ["spammer"]
//! batch_size_limit = 50
//! ```

use crate::limits::{CUSTOM_JSON_SIZE_LIMIT, DEFAULT_BATCH_SIZE_LIMIT};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

pub use config::ConfigError;

/// Cache gateway and memory store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether responses are read from and written to the cache. Defaults to `true`.
    pub enabled: bool,

    /// Upper bound on a single cache read before it counts as a miss. Defaults to `1000`.
    pub read_timeout_ms: u64,

    /// Memory store cap on entry expiry; `0` disables the cap. Defaults to `180`.
    pub memory_max_ttl_seconds: u64,

    /// Memory store capacity. Defaults to `2000`.
    pub memory_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read_timeout_ms: 1000,
            memory_max_ttl_seconds: 180,
            memory_max_entries: 2000,
        }
    }
}

/// Request limits applied before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Accounts that may not sign `custom_json` operations. Absent means none.
    pub accounts_blacklist: Option<HashSet<String>>,

    /// Maximum `custom_json` payload length in characters. Defaults to `2000`.
    pub custom_json_size_limit: usize,

    /// Maximum number of calls in a batch. Defaults to `50`.
    pub batch_size_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            accounts_blacklist: None,
            custom_json_size_limit: CUSTOM_JSON_SIZE_LIMIT,
            batch_size_limit: DEFAULT_BATCH_SIZE_LIMIT,
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name. Defaults to `"development"`.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Request limits. Absent means no blacklist and default size limits.
    #[serde(default)]
    pub limits: Option<LimitsConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            cache: CacheConfig::default(),
            limits: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `GATEWAY__` prefix override any value, using `__` as the
    /// separator for nested fields (e.g., `GATEWAY__CACHE__READ_TIMEOUT_MS=250`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("cache.enabled", true)?
            .set_default("cache.read_timeout_ms", 1000)?
            .set_default("cache.memory_max_ttl_seconds", 180)?
            .set_default("cache.memory_max_entries", 2000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("GATEWAY").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the path in `GATEWAY_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates configuration values.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.read_timeout_ms == 0 {
            return Err("Cache read timeout must be greater than 0".to_string());
        }

        if self.cache.memory_max_entries == 0 {
            return Err("Memory cache capacity must be greater than 0".to_string());
        }

        if let Some(limits) = &self.limits {
            if limits.custom_json_size_limit == 0 {
                return Err("Custom JSON size limit must be greater than 0".to_string());
            }
            if limits.batch_size_limit == 0 {
                return Err("Batch size limit must be greater than 0".to_string());
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    #[must_use]
    pub fn cache_read_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.read_timeout_ms)
    }

    /// Memory store expiry cap, `None` when disabled.
    #[must_use]
    pub fn memory_max_ttl(&self) -> Option<Duration> {
        (self.cache.memory_max_ttl_seconds > 0)
            .then(|| Duration::from_secs(self.cache.memory_max_ttl_seconds))
    }
}
