//! Configuration module for chainwatch
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and provides structured configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidOverride { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Endpoint probe timeouts
    #[serde(default)]
    pub probe: ProbeConfig,

    /// `watch` command behavior
    #[serde(default)]
    pub watch: WatchConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the sled database directory
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Timeout of the `eth_blockNumber` call over HTTP (milliseconds)
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Timeout of the best-effort `eth_getBlockByNumber` call over HTTP (milliseconds)
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,

    /// Overall WebSocket probe timeout (milliseconds)
    #[serde(default = "default_ws_timeout_ms")]
    pub ws_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between probe rounds
    #[serde(default = "default_watch_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Serve Prometheus metrics while watching
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_db_path() -> PathBuf { PathBuf::from("chainwatch.db") }
fn default_http_timeout_ms() -> u64 { 10_000 }
fn default_block_timeout_ms() -> u64 { 5_000 }
fn default_ws_timeout_ms() -> u64 { 10_000 }
fn default_watch_interval() -> u64 { 30 }
fn default_metrics_port() -> u16 { 9090 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: default_http_timeout_ms(),
            block_timeout_ms: default_block_timeout_ms(),
            ws_timeout_ms: default_ws_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    pub fn ws_timeout(&self) -> Duration {
        Duration::from_millis(self.ws_timeout_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_watch_interval(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `CHAINWATCH_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = var("CHAINWATCH_DB") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(value) = var("CHAINWATCH_HTTP_TIMEOUT_MS") {
            self.probe.http_timeout_ms = parse_override("CHAINWATCH_HTTP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("CHAINWATCH_WS_TIMEOUT_MS") {
            self.probe.ws_timeout_ms = parse_override("CHAINWATCH_WS_TIMEOUT_MS", &value)?;
        }
        self.validate()
    }

    /// Reject configurations the prober cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probe = &self.probe;
        if probe.http_timeout_ms == 0 || probe.block_timeout_ms == 0 || probe.ws_timeout_ms == 0 {
            return Err(ConfigError::Invalid("probe timeouts must be greater than zero".into()));
        }
        if probe.block_timeout_ms > probe.http_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "block_timeout_ms ({}) exceeds http_timeout_ms ({})",
                probe.block_timeout_ms, probe.http_timeout_ms
            )));
        }
        if self.watch.interval_secs == 0 {
            return Err(ConfigError::Invalid("watch interval must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_override(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.probe, ProbeConfig::default());
        assert_eq!(config.probe.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe.block_timeout(), Duration::from_secs(5));
        assert_eq!(config.storage.db_path, PathBuf::from("chainwatch.db"));
        assert!(!config.monitoring.enable_metrics);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [probe]
            ws_timeout_ms = 2500

            [monitoring]
            enable_metrics = true
            "#,
        )
        .unwrap();
        assert_eq!(config.probe.ws_timeout_ms, 2500);
        assert_eq!(config.probe.http_timeout_ms, 10_000);
        assert!(config.monitoring.enable_metrics);
        assert_eq!(config.monitoring.metrics_port, 9090);
    }

    #[test]
    fn test_validate_rejects_bad_timeouts() {
        assert!(matches!(
            Config::from_toml("[probe]\nhttp_timeout_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[probe]\nhttp_timeout_ms = 1000\nblock_timeout_ms = 2000"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CHAINWATCH_DB", "/tmp/other.db"),
            ("CHAINWATCH_HTTP_TIMEOUT_MS", "8000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.probe.http_timeout_ms, 8000);

        let err = Config::default()
            .apply_overrides(|name| (name == "CHAINWATCH_WS_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn test_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainwatch.toml");
        std::fs::write(&path, "[watch]\ninterval_secs = 5\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.watch.interval_secs, 5);
        assert!(matches!(
            Config::from_file("/nonexistent/chainwatch.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
