//! Error types for the qr-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while setting up watches.

use camino::Utf8PathBuf;

/// Errors that can occur during change tracking.
///
/// Changes that arrive on the stream never produce an error: non-UTF-8
/// paths and batches sent after the stream is gone are logged and dropped
/// inside the debouncer callback.
///
/// # Error Recovery Strategy
///
/// - **Path not found** ([`WatchError::PathNotFound`]): Recoverable - the
///   path vanished before it could be watched, skip it
/// - **Notify errors** ([`WatchError::Notify`]): Fatal - the platform
///   watcher is unusable (for example, out of watch descriptors)
///
/// # Examples
///
/// ```
/// use qr_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::Notify(e) => eprintln!("Notify error: {e}"),
///         WatchError::PathNotFound(p) => eprintln!("Path not found: {p}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize the debouncer or register a watch.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The path to watch does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Returns `true` if the caller can skip the path and keep tracking.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PathNotFound(_))
    }

    /// Returns `true` if this error is fatal.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::Notify(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_not_found() {
        let err = WatchError::path_not_found("notes/missing");
        assert!(err.is_recoverable());
        assert_eq!(err.path().map(|p| p.as_str()), Some("notes/missing"));
        insta::assert_snapshot!(err.to_string(), @"path does not exist: notes/missing");
    }

    #[test]
    fn test_notify_is_fatal() {
        let err = WatchError::from(notify::Error::generic("too many watches"));
        assert!(err.is_fatal());
        assert!(err.path().is_none());
        insta::assert_snapshot!(err.to_string(), @"notify watcher error: too many watches");
    }
}
