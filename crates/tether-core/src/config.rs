//! Configuration management for Tether.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gate::DEFAULT_SETTLE_DELAY;
use crate::merger::MergerConfig;
use crate::queue::RateLimitedQueue;
use crate::retry::RetryPolicy;

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tether.toml";

/// Tether configuration loaded from `tether.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity defaults; command-line flags take precedence.
    #[serde(default)]
    pub server: ServerConfig,

    /// Timing and polling settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file can't be read, parsed, or holds an
    /// out-of-range value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate(path)?;
        Ok(config)
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.sync.auto_check_interval_ms == 0 {
            return Err(Error::InvalidConfig {
                file: path.to_path_buf(),
                message: "sync.auto_check_interval_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Where the branches live. Every field may be overridden on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server base URL, e.g. `https://git.example.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// The branch the user edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_branch: Option<String>,
}

/// Orchestrator timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub auto_check: bool,
    pub auto_check_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl SyncConfig {
    /// Settings for a [`crate::BranchMerger`].
    #[must_use]
    pub const fn merger_config(&self) -> MergerConfig {
        MergerConfig {
            auto_check: self.auto_check,
            auto_check_interval: Duration::from_millis(self.auto_check_interval_ms),
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ),
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
        }
    }

    /// Pause after a save before re-checking.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_check: false,
            auto_check_interval_ms: millis(MergerConfig::DEFAULT_AUTO_CHECK_INTERVAL),
            retry_attempts: RetryPolicy::DEFAULT_ATTEMPTS,
            retry_delay_ms: millis(RetryPolicy::DEFAULT_DELAY),
            rate_limit_delay_ms: millis(RateLimitedQueue::DEFAULT_SPACING),
            settle_delay_ms: millis(DEFAULT_SETTLE_DELAY),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
