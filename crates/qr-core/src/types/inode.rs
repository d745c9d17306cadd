//! Tracked filesystem entries.
//!
//! An [`Inode`] is either a [`Document`] (an indexable file) or a
//! [`Directory`] (a container whose tokenizer is inherited by its children).
//! Neither carries a tokenizer itself; capabilities are resolved by the
//! registry on demand.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// An opaque identifier for a tracked inode.
///
/// Ids come from a monotonically increasing counter and are never reused,
/// even after the inode they named has been removed.
///
/// # Examples
///
/// ```
/// use qr_core::InodeId;
///
/// let id = InodeId::new(42);
/// assert_eq!(id.as_u64(), 42);
/// assert_eq!(id.to_string(), "#42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeId(pub u64);

impl InodeId {
    /// Creates a new inode id from a u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the inner u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for InodeId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An indexable file.
///
/// # Examples
///
/// ```
/// use qr_core::Document;
///
/// let doc = Document::new("/notes/todo.txt");
/// assert_eq!(doc.path().as_str(), "/notes/todo.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    path: Utf8PathBuf,
}

impl Document {
    /// Creates a document for the given path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document's path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// A directory whose contents are tracked.
///
/// Directories are never tokenized themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Directory {
    path: Utf8PathBuf,
}

impl Directory {
    /// Creates a directory for the given path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the directory's path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// The kind of an [`Inode`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InodeKind {
    /// An indexable file.
    Document,
    /// A container of other inodes.
    Directory,
}

impl InodeKind {
    /// Returns a short lowercase label for log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Directory => "directory",
        }
    }
}

/// A tracked filesystem entry.
///
/// # Examples
///
/// ```
/// use qr_core::{Directory, Inode, InodeKind};
///
/// let inode = Inode::from(Directory::new("/notes"));
/// assert_eq!(inode.kind(), InodeKind::Directory);
/// assert_eq!(inode.path().as_str(), "/notes");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inode {
    /// An indexable file.
    Document(Document),
    /// A container of other inodes.
    Directory(Directory),
}

impl Inode {
    /// Returns the path of the wrapped entry.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Document(doc) => doc.path(),
            Self::Directory(dir) => dir.path(),
        }
    }

    /// Returns the kind of the wrapped entry.
    #[must_use]
    pub const fn kind(&self) -> InodeKind {
        match self {
            Self::Document(_) => InodeKind::Document,
            Self::Directory(_) => InodeKind::Directory,
        }
    }

    /// Returns `true` if this is a [`Document`].
    #[inline]
    #[must_use]
    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    /// Returns `true` if this is a [`Directory`].
    #[inline]
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl From<Document> for Inode {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<Directory> for Inode {
    fn from(dir: Directory) -> Self {
        Self::Directory(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_id_ordering() {
        assert!(InodeId::new(1) < InodeId::new(2));
        assert_eq!(InodeId::from(3), InodeId(3));
    }

    #[test]
    fn test_inode_kind_dispatch() {
        let doc = Inode::from(Document::new("/a.txt"));
        let dir = Inode::from(Directory::new("/a"));

        assert!(doc.is_document());
        assert!(!doc.is_directory());
        assert_eq!(doc.kind().label(), "document");
        assert!(dir.is_directory());
        assert_eq!(dir.kind().label(), "directory");
    }

    #[test]
    fn test_inode_serialization_is_tagged() {
        let inode = Inode::from(Document::new("/a.txt"));
        let json = serde_json::to_string(&inode).unwrap();
        assert_eq!(json, r#"{"kind":"document","path":"/a.txt"}"#);

        let parsed: Inode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, inode);
    }
}
