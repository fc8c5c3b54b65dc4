//! Configuration management for the recorder.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::{RecorderError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete recorder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blob storage configuration
    pub storage: StorageConfig,
    /// Capture defaults
    pub capture: CaptureDefaults,
    /// Replay configuration
    pub replay: ReplayDefaults,
    /// Seed generation defaults
    pub seed: SeedDefaults,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the filesystem blob store
    pub data_dir: PathBuf,
}

/// Defaults applied to newly opened capture sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Recorded as `createdBy` in session metadata
    pub created_by: String,
    /// Gzip captured payloads
    pub compression_enabled: bool,
}

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayDefaults {
    /// Default OTLP/HTTP target
    pub endpoint: String,
    /// Per-request timeout for replayed payloads
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delay between replayed files at speed 1.0
    #[serde(with = "humantime_serde")]
    pub pacing_interval: Duration,
    /// Default pacing factor
    pub speed_multiplier: f64,
}

/// Seed generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedDefaults {
    /// Generated traces per second
    pub traces_per_second: f64,
    /// Probability of a span being marked as an error
    pub error_rate: f64,
    /// How long a seeding run lasts
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./otlp_recorder_data"),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        CaptureDefaults {
            created_by: "cli".to_string(),
            compression_enabled: true,
        }
    }
}

impl Default for ReplayDefaults {
    fn default() -> Self {
        ReplayDefaults {
            endpoint: "http://localhost:4318".to_string(),
            request_timeout: Duration::from_secs(10),
            pacing_interval: Duration::from_millis(100),
            speed_multiplier: 1.0,
        }
    }
}

impl Default for SeedDefaults {
    fn default() -> Self {
        SeedDefaults {
            traces_per_second: 10.0,
            error_rate: 0.05,
            duration: Duration::from_secs(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.replay.endpoint.trim().is_empty() {
            return Err(RecorderError::config("replay endpoint must not be empty"));
        }

        if self.replay.request_timeout.is_zero() {
            return Err(RecorderError::config("request_timeout must be greater than 0"));
        }

        if !(self.replay.speed_multiplier.is_finite() && self.replay.speed_multiplier > 0.0) {
            return Err(RecorderError::config(format!(
                "speed_multiplier must be a positive number, got {}",
                self.replay.speed_multiplier
            )));
        }

        if !(self.seed.traces_per_second.is_finite() && self.seed.traces_per_second > 0.0) {
            return Err(RecorderError::config(format!(
                "traces_per_second must be a positive number, got {}",
                self.seed.traces_per_second
            )));
        }

        if !(0.0..=1.0).contains(&self.seed.error_rate) {
            return Err(RecorderError::config(format!(
                "error_rate must be between 0.0 and 1.0, got {}",
                self.seed.error_rate
            )));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| RecorderError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set data directory
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.storage.data_dir = path;
        self
    }

    /// Set default replay endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.replay.endpoint = endpoint.into();
        self
    }

    /// Set replay request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.replay.request_timeout = timeout;
        self
    }

    /// Set default replay speed
    pub fn speed_multiplier(mut self, speed: f64) -> Self {
        self.config.replay.speed_multiplier = speed;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replay.request_timeout, Duration::from_secs(10));
        assert_eq!(config.replay.pacing_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_speed_multiplier() {
        let mut config = Config::default();
        config.replay.speed_multiplier = 0.0;
        assert!(config.validate().is_err());

        config.replay.speed_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_error_rate() {
        let mut config = Config::default();
        config.seed.error_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .endpoint("http://collector:4318")
            .speed_multiplier(4.0)
            .data_dir(PathBuf::from("/tmp/sessions"))
            .debug(true)
            .build()
            .unwrap();

        assert_eq!(config.replay.endpoint, "http://collector:4318");
        assert_eq!(config.replay.speed_multiplier, 4.0);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/sessions"));
        assert!(config.debug);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
storage:
  data_dir: /var/lib/otlp-recorder
replay:
  endpoint: http://otel-collector:4318
  request_timeout: 5s
  pacing_interval: 250ms
seed:
  traces_per_second: 25
  error_rate: 0.2
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/otlp-recorder"));
        assert_eq!(config.replay.endpoint, "http://otel-collector:4318");
        assert_eq!(config.replay.request_timeout, Duration::from_secs(5));
        assert_eq!(config.replay.pacing_interval, Duration::from_millis(250));
        assert_eq!(config.replay.speed_multiplier, 1.0);
        assert_eq!(config.seed.traces_per_second, 25.0);
        assert_eq!(config.capture.created_by, "cli");
    }
}
