//! Configuration module for loading and parsing TOML configuration files.

use crate::governance::{CacheConfig, RateLimiterConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Live event bus settings.
    #[serde(default)]
    pub events: EventsSettings,
    /// Upstream analysis provider settings.
    #[serde(default)]
    pub provider: ProviderSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Counting window length in milliseconds.
    pub window_ms: u64,
    /// Maximum requests per key per window.
    pub max_requests: u32,
    /// Refund the window slot when the request succeeds.
    pub skip_successful_requests: bool,
    /// Refund the window slot when the request fails.
    pub skip_failed_requests: bool,
    /// Sweep interval for expired keys, in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            skip_successful_requests: false,
            skip_failed_requests: false,
            cleanup_interval_secs: 300,
        }
    }
}

impl RateLimitSettings {
    /// Converts to the rate limiter's own configuration type.
    #[must_use]
    pub fn to_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            window: Duration::from_millis(self.window_ms),
            max_requests: self.max_requests,
            skip_successful_requests: self.skip_successful_requests,
            skip_failed_requests: self.skip_failed_requests,
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether caching is active.
    pub enabled: bool,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// Sweep interval for expired entries, in seconds.
    pub sweep_interval_secs: u64,
    /// Memory estimate above which health degrades to warning.
    pub memory_warning_bytes: u64,
    /// Memory estimate above which health degrades to unhealthy.
    pub memory_critical_bytes: u64,
    /// Error rate above which health degrades to warning.
    pub error_rate_warning: f64,
    /// Error rate above which health degrades to unhealthy.
    pub error_rate_critical: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            enabled: defaults.enabled,
            ttl_secs: defaults.ttl.as_secs(),
            max_entries: defaults.max_entries,
            sweep_interval_secs: defaults.sweep_interval.as_secs(),
            memory_warning_bytes: defaults.memory_warning_bytes,
            memory_critical_bytes: defaults.memory_critical_bytes,
            error_rate_warning: defaults.error_rate_warning,
            error_rate_critical: defaults.error_rate_critical,
        }
    }
}

impl CacheSettings {
    /// Converts to the cache's own configuration type.
    #[must_use]
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.enabled,
            ttl: Duration::from_secs(self.ttl_secs),
            max_entries: self.max_entries,
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            memory_warning_bytes: self.memory_warning_bytes,
            memory_critical_bytes: self.memory_critical_bytes,
            error_rate_warning: self.error_rate_warning,
            error_rate_critical: self.error_rate_critical,
        }
    }
}

/// Live event bus settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsSettings {
    /// Ring buffer capacity.
    pub buffer_capacity: usize,
    /// Keep-alive tick interval in milliseconds, while subscribers are attached.
    pub keepalive_interval_ms: u64,
    /// Streaming heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for EventsSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 200,
            keepalive_interval_ms: 1000,
            heartbeat_interval_secs: 15,
        }
    }
}

/// Upstream analysis provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL of the AI analysis provider.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum accepted chart image size in bytes.
    pub max_image_bytes: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            timeout_secs: 30,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Invalid tunables are rejected here, at load time, not deferred to
    /// first use.
    fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit
            .to_limiter_config()
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        self.cache
            .to_cache_config()
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if self.events.buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "events buffer_capacity must be positive".to_string(),
            ));
        }
        if self.events.keepalive_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "events keepalive_interval_ms must be positive".to_string(),
            ));
        }
        if self.events.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "events heartbeat_interval_secs must be positive".to_string(),
            ));
        }
        if self.provider.base_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "provider base_url cannot be empty".to_string(),
            ));
        }
        if self.provider.max_image_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "provider max_image_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 3000

[rate_limit]
window_ms = 30000
max_requests = 50
skip_failed_requests = true

[cache]
ttl_secs = 900
max_entries = 250

[events]
buffer_capacity = 100
heartbeat_interval_secs = 10

[provider]
base_url = "http://analysis.internal:9000"
timeout_secs = 15
"#;

        let config = Config::parse(toml_content).expect("should parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.window_ms, 30000);
        assert_eq!(config.rate_limit.max_requests, 50);
        assert!(config.rate_limit.skip_failed_requests);
        assert!(!config.rate_limit.skip_successful_requests);
        assert_eq!(config.cache.ttl_secs, 900);
        assert_eq!(config.cache.max_entries, 250);
        assert_eq!(config.events.buffer_capacity, 100);
        assert_eq!(config.events.heartbeat_interval_secs, 10);
        assert_eq!(config.provider.base_url, "http://analysis.internal:9000");
        assert_eq!(config.provider.timeout_secs, 15);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse("").expect("should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.events.buffer_capacity, 200);
        assert_eq!(config.provider.timeout_secs, 30);
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let result = Config::parse("[rate_limit]\nwindow_ms = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let result = Config::parse("[cache]\nttl_secs = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_empty_provider_url() {
        let result = Config::parse("[provider]\nbase_url = \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_event_buffer() {
        let result = Config::parse("[events]\nbuffer_capacity = 0\n");
        assert!(result.is_err());
    }
}
