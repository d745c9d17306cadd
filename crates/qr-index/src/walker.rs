//! Directory traversal for registration.
//!
//! This module provides [`DirectoryWalker`], which uses the `ignore` crate
//! to list everything under a directory that the registry should track.
//!
//! # Features
//!
//! - Skips hidden (dot-prefixed) files and directories
//! - Optionally skips binary files, detected by a NUL byte in the first
//!   8 KiB
//! - Yields parents before their children
//! - Converts paths to UTF-8 [`Utf8PathBuf`]
//!
//! `.gitignore` files are not consulted: every visible file is a document.

use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use qr_core::{IndexConfig, InodeKind};
use tracing::{debug, warn};

use crate::error::IndexError;

/// How many leading bytes are inspected for binary detection.
const BINARY_SNIFF_LEN: usize = 8192;

/// An entry discovered under the walked directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Absolute path of the entry.
    pub path: Utf8PathBuf,
    /// Whether the entry is a document or a directory.
    pub kind: InodeKind,
}

/// Lists the documents and directories under a root directory.
///
/// The walk is single-threaded and collects every entry before returning;
/// tokenization is parallelized afterwards.
///
/// # Examples
///
/// ```no_run
/// use qr_index::DirectoryWalker;
/// use camino::Utf8Path;
///
/// # fn example() -> Result<(), qr_index::IndexError> {
/// let walker = DirectoryWalker::new(Utf8Path::new("/home/me/notes"))?
///     .with_skip_binary(false);
/// for entry in walker.collect_entries() {
///     println!("{} {}", entry.kind.label(), entry.path);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: Utf8PathBuf,
    follow_links: bool,
    skip_binary: bool,
}

impl DirectoryWalker {
    /// Creates a walker for the given root directory.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the root doesn't exist, or
    /// [`IndexError::InvalidKind`] if it isn't a directory.
    pub fn new(root: &Utf8Path) -> Result<Self, IndexError> {
        if !root.exists() {
            return Err(IndexError::not_found(root));
        }
        if !root.is_dir() {
            return Err(IndexError::InvalidKind {
                path: root.to_owned(),
                expected: InodeKind::Directory,
                found: InodeKind::Document,
            });
        }

        Ok(Self {
            root: root.to_owned(),
            follow_links: false,
            skip_binary: true,
        })
    }

    /// Creates a walker configured from [`IndexConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(root: &Utf8Path, config: &IndexConfig) -> Result<Self, IndexError> {
        Ok(Self::new(root)?
            .with_follow_links(config.follow_links)
            .with_skip_binary(config.skip_binary))
    }

    /// Configures whether to follow symbolic links.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Configures whether binary files are skipped.
    #[must_use]
    pub const fn with_skip_binary(mut self, skip: bool) -> Self {
        self.skip_binary = skip;
        self
    }

    /// Returns the root directory being walked.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Collects every qualifying entry below the root, parents first.
    ///
    /// The root itself is not included. Unreadable entries and non-UTF-8
    /// paths are logged and skipped.
    #[must_use]
    pub fn collect_entries(&self) -> Vec<WalkEntry> {
        let mut entries = Vec::new();

        for result in self.build_walker() {
            let entry = match result {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(root = %self.root, %error, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            let kind = if file_type.is_dir() {
                InodeKind::Directory
            } else if file_type.is_file() {
                InodeKind::Document
            } else {
                continue;
            };

            let path = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => path,
                Err(path) => {
                    warn!(path = %path.display(), "Skipping non-UTF-8 path");
                    continue;
                }
            };

            if kind == InodeKind::Document && self.skip_binary && is_binary(&path) {
                debug!(path = %path, "Skipping binary file");
                continue;
            }

            entries.push(WalkEntry { path, kind });
        }

        entries
    }

    fn build_walker(&self) -> ignore::Walk {
        WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(true)
            .follow_links(self.follow_links)
            .threads(1)
            .build()
    }
}

/// Returns `true` if the file's leading bytes contain a NUL byte.
///
/// Unreadable files are not considered binary; reading them fails later
/// with a proper error.
#[must_use]
pub fn is_binary(path: &Utf8Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut head = Vec::with_capacity(BINARY_SNIFF_LEN);
    match file.take(BINARY_SNIFF_LEN as u64).read_to_end(&mut head) {
        Ok(_) => head.contains(&0),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_walker_missing_root() {
        let err = DirectoryWalker::new(Utf8Path::new("/nonexistent/quarry")).unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[test]
    fn test_walker_rejects_file_root() {
        let (_dir, root) = temp_root();
        let file = root.join("a.txt");
        fs::write(&file, "x").unwrap();
        let err = DirectoryWalker::new(&file).unwrap_err();
        assert!(matches!(err, IndexError::InvalidKind { .. }));
    }

    #[test]
    fn test_collect_entries_skips_hidden() {
        let (_dir, root) = temp_root();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join(".secret"), "s").unwrap();
        fs::write(root.join(".git/config"), "c").unwrap();
        fs::write(root.join("sub/b.txt"), "b").unwrap();
        fs::write(root.join("sub/deeper/c.txt"), "c").unwrap();

        let entries = DirectoryWalker::new(&root).unwrap().collect_entries();
        let mut found: Vec<(String, InodeKind)> = entries
            .iter()
            .map(|e| (e.path.strip_prefix(&root).unwrap().to_string(), e.kind))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            found,
            vec![
                ("a.txt".to_owned(), InodeKind::Document),
                ("sub".to_owned(), InodeKind::Directory),
                ("sub/b.txt".to_owned(), InodeKind::Document),
                ("sub/deeper".to_owned(), InodeKind::Directory),
                ("sub/deeper/c.txt".to_owned(), InodeKind::Document),
            ]
        );
    }

    #[test]
    fn test_parents_come_first() {
        let (_dir, root) = temp_root();
        fs::create_dir_all(root.join("x/y")).unwrap();
        fs::write(root.join("x/y/z.txt"), "z").unwrap();

        let entries = DirectoryWalker::new(&root).unwrap().collect_entries();
        let position = |p: &str| entries.iter().position(|e| e.path == root.join(p)).unwrap();
        assert!(position("x") < position("x/y"));
        assert!(position("x/y") < position("x/y/z.txt"));
    }

    #[test]
    fn test_binary_files_skipped_by_default() {
        let (_dir, root) = temp_root();
        fs::write(root.join("text.txt"), "plain words").unwrap();
        fs::write(root.join("blob.bin"), [0x89, b'P', b'N', b'G', 0x00, 0x01]).unwrap();

        let skipping = DirectoryWalker::new(&root).unwrap().collect_entries();
        assert_eq!(skipping.len(), 1);
        assert!(!is_binary(&root.join("text.txt")));
        assert!(is_binary(&root.join("blob.bin")));

        let config = IndexConfig {
            skip_binary: false,
            ..IndexConfig::default()
        };
        let keeping = DirectoryWalker::from_config(&root, &config)
            .unwrap()
            .collect_entries();
        assert_eq!(keeping.len(), 2);
    }
}
