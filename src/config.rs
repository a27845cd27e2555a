//! Configuration for keypet.

use crate::core::{DebouncePolicy, LevelCurve};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the engine.
///
/// Every field has a default so config files from older or newer versions
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the saved progress
    pub data_path: PathBuf,

    /// How often a stats snapshot is pushed to the presentation layer
    #[serde(with = "duration_ms")]
    pub snapshot_interval: Duration,

    /// How often the rate window is pruned and the watchdog polled
    #[serde(with = "duration_ms")]
    pub rate_tick_interval: Duration,

    /// How often dirty progress is written to disk
    #[serde(with = "duration_secs")]
    pub save_interval: Duration,

    /// Silence after start (or reinitialization) that counts as broken capture
    #[serde(with = "duration_secs")]
    pub silence_timeout: Duration,

    /// Delay before a user-requested capture retry
    #[serde(with = "duration_ms")]
    pub manual_retry_delay: Duration,

    /// Upper bound on the final save at shutdown
    #[serde(with = "duration_ms")]
    pub shutdown_save_deadline: Duration,

    /// Whether degraded mode schedules retries on its own
    pub auto_retry: bool,

    /// Delays between automatic retries
    pub retry_backoff: BackoffConfig,

    /// Which presses count as keystrokes
    pub debounce: DebouncePolicy,

    /// Leveling curve
    pub curve: LevelCurve,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keypet");

        Self {
            data_path: data_dir,
            snapshot_interval: Duration::from_millis(100),
            rate_tick_interval: Duration::from_secs(1),
            save_interval: Duration::from_secs(30),
            silence_timeout: Duration::from_secs(60),
            manual_retry_delay: Duration::from_secs(1),
            shutdown_save_deadline: Duration::from_secs(2),
            auto_retry: true,
            retry_backoff: BackoffConfig::default(),
            debounce: DebouncePolicy::default(),
            curve: LevelCurve::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keypet")
            .join("config.json")
    }

    /// Path of the saved progress file.
    pub fn progress_path(&self) -> PathBuf {
        self.data_path.join("progress.json")
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.curve.validate().map_err(ConfigError::Invalid)?;

        let intervals = [
            ("snapshot_interval", self.snapshot_interval),
            ("rate_tick_interval", self.rate_tick_interval),
            ("save_interval", self.save_interval),
            ("silence_timeout", self.silence_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        if self.retry_backoff.initial.is_zero() || self.retry_backoff.multiplier == 0 {
            return Err(ConfigError::Invalid(
                "retry_backoff needs a positive initial delay and multiplier".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff between automatic capture retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(with = "duration_secs")]
    pub initial: Duration,
    #[serde(with = "duration_secs")]
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(60),
            max: Duration::from_secs(15 * 60),
            multiplier: 2,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
