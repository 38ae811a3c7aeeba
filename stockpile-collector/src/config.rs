//! Serializable collector configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Knobs for a batch collection run.
///
/// Every field has a default, so a config file only needs the values it
/// changes. The same struct is filled from CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Provider request budget, in requests per minute.
    pub requests_per_minute: u32,

    /// Number of worker threads fetching concurrently.
    pub concurrency: usize,

    /// Attempts per ticker before its task is marked failed.
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds; doubles per attempt.
    pub backoff_base_secs: f64,

    /// Calendar-day gap beyond which a collected series is flagged.
    pub gap_tolerance_days: i64,

    /// Fetch a fundamentals snapshot alongside price history.
    pub fundamentals: bool,

    /// Skip tickers whose manifest entry already covers the window.
    pub resume: bool,

    /// Root directory of the data store.
    pub data_dir: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
            concurrency: 4,
            max_attempts: 3,
            backoff_base_secs: 1.0,
            gap_tolerance_days: 5,
            fundamentals: true,
            resume: true,
            data_dir: PathBuf::from("data/raw"),
        }
    }
}

impl CollectorConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "requests_per_minute must be at least 1".into(),
            ));
        }
        if !self.backoff_base_secs.is_finite() || self.backoff_base_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "backoff_base_secs must be a non-negative number".into(),
            ));
        }
        if self.gap_tolerance_days < 1 {
            return Err(ConfigError::Invalid(
                "gap_tolerance_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
