//! Error types for the qr-tokenize crate.

use camino::{Utf8Path, Utf8PathBuf};

/// Errors that can occur while tokenizing a document.
///
/// Tokenization errors are always specific to one document; other documents
/// can still be tokenized.
///
/// # Examples
///
/// ```
/// use qr_tokenize::TokenizeError;
/// use std::io;
///
/// let err = TokenizeError::read("notes/a.txt", io::Error::from(io::ErrorKind::NotFound));
/// assert_eq!(err.path().as_str(), "notes/a.txt");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    /// The document couldn't be opened or read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The document that couldn't be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TokenizeError {
    /// Creates a new [`TokenizeError::Read`] error.
    #[inline]
    pub fn read(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Returns the document this error is about.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Read { path, .. } => path,
        }
    }

    /// Returns the underlying I/O error kind.
    #[must_use]
    pub fn io_kind(&self) -> std::io::ErrorKind {
        match self {
            Self::Read { source, .. } => source.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_read_display() {
        let err = TokenizeError::read(
            "/docs/missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        insta::assert_snapshot!(
            err.to_string(),
            @"failed to read /docs/missing.txt: No such file or directory"
        );
        assert_eq!(err.io_kind(), io::ErrorKind::NotFound);
    }
}
