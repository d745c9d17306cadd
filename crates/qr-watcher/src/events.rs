//! Change batches and classified watch events.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//! notify-debouncer-mini (coalescing delay)
//!        │
//!        ▼
//!   ChangeBatch (raw changed paths)
//!        │
//!        ▼
//!   FileTracker::classify
//!        │
//!        ▼
//!   WatchEvent (Created / Modified / Deleted)
//! ```

use std::fmt;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    /// A path appeared under a watched directory.
    Created,
    /// A tracked path still exists and changed.
    Modified,
    /// A tracked path no longer exists.
    Deleted,
}

impl WatchEventKind {
    /// Returns a lowercase label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified change to a tracked path.
///
/// # Examples
///
/// ```
/// use qr_watcher::{WatchEvent, WatchEventKind};
/// use camino::Utf8PathBuf;
///
/// let event = WatchEvent::new(
///     WatchEventKind::Created,
///     Utf8PathBuf::from("/notes/todo.txt"),
///     Utf8PathBuf::from("/notes"),
/// );
/// assert_eq!(event.depth(), 2);
/// assert_eq!(event.to_string(), "created /notes/todo.txt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,

    /// The absolute path that changed.
    pub path: Utf8PathBuf,

    /// The watched directory that reported the change.
    pub root: Utf8PathBuf,

    /// When the batch carrying this event was received.
    pub timestamp: Instant,
}

impl WatchEvent {
    /// Creates a new event stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(kind: WatchEventKind, path: Utf8PathBuf, root: Utf8PathBuf) -> Self {
        Self::with_timestamp(kind, path, root, Instant::now())
    }

    /// Creates a new event with a specific timestamp.
    #[inline]
    #[must_use]
    pub const fn with_timestamp(
        kind: WatchEventKind,
        path: Utf8PathBuf,
        root: Utf8PathBuf,
        timestamp: Instant,
    ) -> Self {
        Self {
            kind,
            path,
            root,
            timestamp,
        }
    }

    /// Returns the number of normal components in the path.
    #[must_use]
    pub fn depth(&self) -> usize {
        path_depth(&self.path)
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

pub(crate) fn path_depth(path: &Utf8Path) -> usize {
    path.components()
        .filter(|c| matches!(c, camino::Utf8Component::Normal(_)))
        .count()
}

/// Raw changed paths delivered together by the debouncer.
///
/// Uses [`SmallVec`] with inline storage for up to 8 paths, avoiding heap
/// allocation in the common case of small batches.
///
/// # Examples
///
/// ```
/// use qr_watcher::ChangeBatch;
/// use camino::Utf8PathBuf;
///
/// let mut batch = ChangeBatch::new();
/// batch.push(Utf8PathBuf::from("/notes/a.txt"));
/// batch.push(Utf8PathBuf::from("/notes/a.txt"));
/// batch.push(Utf8PathBuf::from("/notes/b.txt"));
///
/// assert_eq!(batch.len(), 3);
/// assert_eq!(batch.unique_paths().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// The changed paths, in arrival order.
    pub paths: SmallVec<[Utf8PathBuf; 8]>,

    /// The timestamp when this batch was created.
    pub received_at: Instant,
}

impl ChangeBatch {
    /// Creates a new empty batch.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            paths: SmallVec::new(),
            received_at: Instant::now(),
        }
    }

    /// Adds a path to the batch.
    #[inline]
    pub fn push(&mut self, path: Utf8PathBuf) {
        self.paths.push(path);
    }

    /// Returns the number of paths in this batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if the batch contains no paths.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Returns an iterator over the paths.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.paths.iter()
    }

    /// Returns the unique paths in this batch, sorted.
    #[must_use]
    pub fn unique_paths(&self) -> Vec<&Utf8PathBuf> {
        let mut paths: Vec<&Utf8PathBuf> = self.paths.iter().collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

impl Default for ChangeBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Utf8PathBuf> for ChangeBatch {
    fn from_iter<T: IntoIterator<Item = Utf8PathBuf>>(iter: T) -> Self {
        Self {
            paths: iter.into_iter().collect(),
            received_at: Instant::now(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeBatch {
    type Item = &'a Utf8PathBuf;
    type IntoIter = std::slice::Iter<'a, Utf8PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Summary statistics for a set of classified events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of Created events.
    pub created: usize,

    /// Number of Modified events.
    pub modified: usize,

    /// Number of Deleted events.
    pub deleted: usize,
}

impl BatchStats {
    /// Counts events by kind.
    #[must_use]
    pub fn from_events(events: &[WatchEvent]) -> Self {
        events.iter().fold(Self::default(), |mut stats, event| {
            match event.kind {
                WatchEventKind::Created => stats.created += 1,
                WatchEventKind::Modified => stats.modified += 1,
                WatchEventKind::Deleted => stats.deleted += 1,
            }
            stats
        })
    }

    /// Returns the total number of events.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.modified + self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: WatchEventKind, path: &str) -> WatchEvent {
        WatchEvent::new(kind, Utf8PathBuf::from(path), Utf8PathBuf::from("/root"))
    }

    #[test]
    fn test_event_depth() {
        assert_eq!(event(WatchEventKind::Created, "/").depth(), 0);
        assert_eq!(event(WatchEventKind::Created, "/a").depth(), 1);
        assert_eq!(event(WatchEventKind::Created, "/a/b/c.txt").depth(), 3);
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&WatchEventKind::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }

    #[test]
    fn test_batch_from_iterator() {
        let batch: ChangeBatch = ["/a", "/b", "/a"].into_iter().map(Utf8PathBuf::from).collect();
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());

        let unique: Vec<&str> = batch.unique_paths().iter().map(|p| p.as_str()).collect();
        assert_eq!(unique, ["/a", "/b"]);
    }

    #[test]
    fn test_batch_stats() {
        let events = [
            event(WatchEventKind::Created, "/root/a"),
            event(WatchEventKind::Created, "/root/b"),
            event(WatchEventKind::Modified, "/root/c"),
            event(WatchEventKind::Deleted, "/root/d"),
        ];
        let stats = BatchStats::from_events(&events);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.total(), 4);
    }
}
