//! Error types for the qr-index crate.
//!
//! This module provides the [`IndexError`] type for errors that can occur
//! while registering, indexing, searching, or reconciling watch events.

use camino::Utf8PathBuf;
use qr_core::{ConfigError, InodeKind};
use qr_tokenize::TokenizeError;
use qr_watcher::WatchError;

/// Errors that can occur during index operations.
///
/// # Error Recovery Strategy
///
/// - **Divergence** ([`IndexError::Diverged`]): Fatal - the registry no
///   longer mirrors the filesystem, the dispatch loop stops
/// - **Pool / task failures** ([`IndexError::Pool`], [`IndexError::Task`]): Fatal
/// - **Everything else**: Specific to one path or one call; the dispatch
///   loop logs it and continues
///
/// # Examples
///
/// ```
/// use qr_index::IndexError;
///
/// fn handle_error(err: IndexError) {
///     if err.is_fatal() {
///         eprintln!("Index stopped: {err}");
///     } else {
///         eprintln!("Skipped: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The path does not exist on disk.
    #[error("path does not exist: {0}")]
    NotFound(Utf8PathBuf),

    /// The record is not tracked by the registry.
    #[error("not tracked: {0}")]
    NotTracked(Utf8PathBuf),

    /// The path exists but is the wrong kind of entry.
    #[error("expected a {} at {path}, found a {}", expected.label(), found.label())]
    InvalidKind {
        /// The offending path.
        path: Utf8PathBuf,
        /// The kind the operation needs.
        expected: InodeKind,
        /// The kind found on disk.
        found: InodeKind,
    },

    /// A conjunctive search was given no tokens.
    #[error("query has no tokens")]
    EmptyQuery,

    /// The watch dispatcher was already started for this reconciler.
    #[error("watch dispatcher already started")]
    AlreadyStarted,

    /// A watch event referenced a path the registry doesn't know.
    #[error("index diverged from the filesystem at {path}: {reason}")]
    Diverged {
        /// The path of the offending event.
        path: Utf8PathBuf,
        /// What was missing.
        reason: &'static str,
    },

    /// A document couldn't be tokenized.
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    /// A watch couldn't be set up.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// An I/O error occurred on a specific path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tokenization worker pool couldn't be built.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The dispatch task panicked or was cancelled.
    #[error("dispatch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IndexError {
    /// Creates a new [`IndexError::NotFound`] error.
    #[inline]
    pub fn not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Creates a new [`IndexError::NotTracked`] error.
    #[inline]
    pub fn not_tracked(path: impl Into<Utf8PathBuf>) -> Self {
        Self::NotTracked(path.into())
    }

    /// Creates a new [`IndexError::Diverged`] error.
    #[inline]
    pub fn diverged(path: impl Into<Utf8PathBuf>, reason: &'static str) -> Self {
        Self::Diverged {
            path: path.into(),
            reason,
        }
    }

    /// Creates a new [`IndexError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the dispatch loop must stop on this error.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Diverged { .. } | Self::Pool(_) | Self::Task(_))
    }

    /// Returns `true` if this error only affects one call or one path.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::NotFound(path)
            | Self::NotTracked(path)
            | Self::InvalidKind { path, .. }
            | Self::Diverged { path, .. }
            | Self::Io { path, .. }
            | Self::Tokenize(TokenizeError::Read { path, .. }) => Some(path),
            Self::Watch(err) => err.path(),
            Self::EmptyQuery
            | Self::AlreadyStarted
            | Self::Config(_)
            | Self::Pool(_)
            | Self::Task(_) => None,
        }
    }
}
