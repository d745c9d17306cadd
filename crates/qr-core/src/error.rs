//! Error types for the qr-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration loading
//! and validation failures.

/// Errors that can occur while loading or validating configuration.
///
/// # Examples
///
/// ```
/// use qr_core::ConfigError;
///
/// let error = ConfigError::invalid_option("watch.debounce_ms", "must be positive");
/// assert!(error.to_string().contains("watch.debounce_ms"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("index.worker_threads", "must be at least 1");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid configuration option 'index.worker_threads': must be at least 1"
        );
    }

    #[test]
    fn test_io_display() {
        let error = ConfigError::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert!(error.to_string().starts_with("failed to read configuration"));
    }
}
