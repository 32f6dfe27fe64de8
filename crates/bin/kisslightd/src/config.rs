//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `kisslight.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use kisslight_adapter_control_tcp::ServerConfig;
use kisslight_adapter_mqtt::MqttConfig;
use serde::Deserialize;

const CONFIG_FILE: &str = "kisslight.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control listener settings.
    pub server: ServerConfig,
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Write-back settings.
    pub sync: SyncConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// Registry capacity. Stored rows beyond it are not loaded.
    pub max_dev_count: usize,
}

/// Write-back synchronizer timing and retry settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    /// Extra attempts for a failed store write before it is dropped.
    pub max_retries: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `kisslight.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("KISSLIGHT_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("KISSLIGHT_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("KISSLIGHT_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("KISSLIGHT_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("KISSLIGHT_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("KISSLIGHT_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.server.max_clients == 0 {
            return Err(ConfigError::Validation(
                "max_clients must be non-zero".to_string(),
            ));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker_port must be non-zero".to_string(),
            ));
        }
        if self.database.max_dev_count == 0 {
            return Err(ConfigError::Validation(
                "max_dev_count must be non-zero".to_string(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sync interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl SyncConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:kisslight.db?mode=rwc".to_string(),
            max_dev_count: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            interval_secs: 5,
            max_retries: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "kisslightd=info,kisslight=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
