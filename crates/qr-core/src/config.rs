//! Configuration structures for the quarry search index.
//!
//! - [`IndexConfig`] - Indexing settings (worker pool, walk behavior)
//! - [`WatchConfig`] - Watch event source settings (coalescing, channel size)
//! - [`Config`] - Root configuration combining both
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a partial JSON document is a valid configuration.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for indexing.
///
/// # Examples
///
/// ```
/// use qr_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert!(config.worker_threads.is_none());
/// assert!(config.skip_binary);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Size of the tokenization worker pool.
    /// `None` means one worker per available CPU core.
    pub worker_threads: Option<usize>,

    /// Whether directory walks follow symbolic links.
    pub follow_links: bool,

    /// Whether directory walks skip files whose leading bytes contain NUL.
    pub skip_binary: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            follow_links: false,
            skip_binary: true,
        }
    }
}

/// Configuration for the watch event source.
///
/// # Examples
///
/// ```
/// use qr_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.debounce_ms, 500);
/// assert_eq!(config.channel_capacity, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Coalescing delay in milliseconds.
    ///
    /// Changes to the same path within this window are delivered once.
    pub debounce_ms: u64,

    /// Capacity of the channel between the watcher thread and the dispatcher.
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            channel_capacity: 100,
        }
    }
}

/// Root configuration for quarry.
///
/// # Examples
///
/// ```
/// use qr_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"watch": {"debounce_ms": 50}}"#)?;
/// assert_eq!(config.watch.debounce_ms, 50);
/// assert!(config.index.skip_binary);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Indexing configuration.
    pub index: IndexConfig,

    /// Watch event source configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file can't be read,
    /// [`ConfigError::Parse`] if it isn't valid JSON for this structure, and
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that deserialize fine but can't be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero-sized worker pool,
    /// a zero coalescing delay, or a zero channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.worker_threads == Some(0) {
            return Err(ConfigError::invalid_option(
                "index.worker_threads",
                "must be at least 1",
            ));
        }
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::invalid_option(
                "watch.debounce_ms",
                "must be positive",
            ));
        }
        if self.watch.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "watch.channel_capacity",
                "must be positive",
            ));
        }
        Ok(())
    }
}
