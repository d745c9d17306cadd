//! Per-path change tracking over a debounced `notify` watcher.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    Debouncer Thread (notify)                     │
//! │  ┌──────────────────┐    ┌─────────────────┐    ┌─────────────┐  │
//! │  │ RecommendedWatcher│ -> │ Debouncer       │ -> │ Callback    │  │
//! │  │ (non-recursive)  │    │ (coalescing)    │    │ (filtering) │  │
//! │  └──────────────────┘    └─────────────────┘    └──────┬──────┘  │
//! └────────────────────────────────────────────────────────│─────────┘
//!                                                          │
//!                                            blocking_send │
//!                                                          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                         │
//! │  ┌──────────────────┐    ┌──────────────────┐                    │
//! │  │ WatchStream      │ -> │ FileTracker      │ -> WatchEvents     │
//! │  │ (ChangeBatch)    │    │ ::classify       │                    │
//! │  └──────────────────┘    └──────────────────┘                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every watch is non-recursive. A tracked directory gets one watch per
//! non-hidden subdirectory, and a tracked file gets a watch on its parent
//! that only reports the individually tracked files in it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use parking_lot::Mutex;
use qr_core::{FxHashMap, FxHashSet, WatchConfig};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::WatchError;
use crate::events::{ChangeBatch, WatchEvent, WatchEventKind};
use crate::filter::{CompositeFilter, FileFilter, HiddenFilter};

/// Receiving half of the change channel.
///
/// Yields raw [`ChangeBatch`]es; pass them to [`FileTracker::classify`] to
/// get [`WatchEvent`]s. The stream ends once every [`FileTracker`] clone
/// has been dropped.
#[derive(Debug)]
pub struct WatchStream {
    rx: mpsc::Receiver<ChangeBatch>,
}

impl WatchStream {
    /// Receives the next batch of changed paths.
    pub async fn recv(&mut self) -> Option<ChangeBatch> {
        self.rx.recv().await
    }

    /// Tries to receive a batch without waiting.
    pub fn try_recv(&mut self) -> Result<ChangeBatch, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

#[derive(Debug, Default)]
struct DirWatch {
    /// Every entry of the directory is reported, not just `files`.
    whole: bool,
    files: FxHashSet<Utf8PathBuf>,
}

struct TrackerState {
    debouncer: Debouncer<RecommendedWatcher>,
    dirs: FxHashMap<Utf8PathBuf, DirWatch>,
    /// Paths believed to exist on disk.
    known: FxHashSet<Utf8PathBuf>,
    /// Paths explicitly untracked while their parent is still watched whole.
    /// Their changes are dropped until they are tracked again or deleted.
    released: FxHashSet<Utf8PathBuf>,
}

impl TrackerState {
    fn watch_dir(&mut self, dir: &Utf8Path) -> Result<&mut DirWatch, WatchError> {
        if !self.dirs.contains_key(dir) {
            self.debouncer
                .watcher()
                .watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
            trace!(dir = %dir, "Watching directory");
        }
        Ok(self.dirs.entry(dir.to_owned()).or_default())
    }

    fn unwatch_dir(&mut self, dir: &Utf8Path) {
        if self.dirs.remove(dir).is_some() {
            // The OS drops watches on deleted directories by itself
            if let Err(error) = self.debouncer.watcher().unwatch(dir.as_std_path()) {
                trace!(dir = %dir, %error, "Watch already released");
            }
        }
    }

    /// Drops `prefix` and everything beneath it from the live view and
    /// releases the watches that belonged to it.
    fn release_prefix(&mut self, prefix: &Utf8Path) {
        self.known.retain(|path| !path.starts_with(prefix));
        self.released.retain(|path| !path.starts_with(prefix));

        let nested: Vec<Utf8PathBuf> = self
            .dirs
            .keys()
            .filter(|dir| dir.starts_with(prefix))
            .cloned()
            .collect();
        for dir in nested {
            self.unwatch_dir(&dir);
        }

        if let Some(parent) = prefix.parent() {
            let orphaned = self.dirs.get_mut(parent).is_some_and(|watch| {
                watch.files.remove(prefix);
                !watch.whole && watch.files.is_empty()
            });
            if orphaned {
                self.unwatch_dir(parent);
            }
        }
    }

    fn watches_whole(&self, dir: &Utf8Path) -> bool {
        self.dirs.get(dir).is_some_and(|watch| watch.whole)
    }

    fn is_released(&self, path: &Utf8Path) -> bool {
        !self.released.is_empty() && path.ancestors().any(|p| self.released.contains(p))
    }
}

/// Tracks directories and files and classifies their changes.
///
/// Cheap to clone; clones share one set of watches.
///
/// # Examples
///
/// ```no_run
/// use qr_watcher::{AcceptAllFilter, FileTracker};
/// use qr_core::WatchConfig;
/// use camino::Utf8Path;
///
/// # async fn example() -> Result<(), qr_watcher::WatchError> {
/// let (tracker, mut stream) = FileTracker::new(&WatchConfig::default(), AcceptAllFilter)?;
/// tracker.track_directory(Utf8Path::new("/home/me/notes"), Vec::new())?;
///
/// while let Some(batch) = stream.recv().await {
///     for event in tracker.classify(&batch) {
///         println!("{event}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FileTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl fmt::Debug for FileTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FileTracker")
            .field("watched_dirs", &state.dirs.len())
            .field("known", &state.known.len())
            .field("released", &state.released.len())
            .finish_non_exhaustive()
    }
}

impl FileTracker {
    /// Creates a tracker and the stream its changes arrive on.
    ///
    /// Hidden paths are always dropped; `filter` decides about the rest.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the debouncer fails to initialize.
    pub fn new<F: FileFilter>(
        config: &WatchConfig,
        filter: F,
    ) -> Result<(Self, WatchStream), WatchError> {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let filter = CompositeFilter::new().and(HiddenFilter).and(filter);
        let timeout = Duration::from_millis(config.debounce_ms);

        let debouncer = new_debouncer(timeout, move |res: DebounceEventResult| match res {
            Ok(events) => {
                let batch: ChangeBatch = events
                    .into_iter()
                    .filter_map(|event| match Utf8PathBuf::from_path_buf(event.path) {
                        Ok(path) => Some(path),
                        Err(path) => {
                            warn!(path = %path.display(), "Skipping non-UTF-8 path in change batch");
                            None
                        }
                    })
                    .filter(|path| {
                        let keep = filter.should_process(path);
                        if !keep {
                            trace!(path = %path, "Filtered out change");
                        }
                        keep
                    })
                    .collect();
                if batch.is_empty() {
                    return;
                }
                if tx.blocking_send(batch).is_err() {
                    debug!("Change channel closed, dropping batch");
                }
            }
            Err(error) => warn!(%error, "Debouncer error"),
        })?;

        debug!(debounce_ms = config.debounce_ms, "File tracker started");

        let tracker = Self {
            state: Arc::new(Mutex::new(TrackerState {
                debouncer,
                dirs: FxHashMap::default(),
                known: FxHashSet::default(),
                released: FxHashSet::default(),
            })),
        };
        Ok((tracker, WatchStream { rx }))
    }

    /// Watches a directory and every non-hidden subdirectory below it.
    ///
    /// `known` seeds the live view with paths that already exist under the
    /// directory, so their later changes classify as Modified or Deleted
    /// instead of Created.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if `path` is not a directory, or
    /// [`WatchError::Notify`] if a watch can't be registered.
    pub fn track_directory(
        &self,
        path: &Utf8Path,
        known: impl IntoIterator<Item = Utf8PathBuf>,
    ) -> Result<(), WatchError> {
        if !path.is_dir() {
            return Err(WatchError::path_not_found(path));
        }
        let subdirs = discover_subdirectories(path);

        let mut state = self.state.lock();
        state.released.retain(|p| !p.starts_with(path));
        state.watch_dir(path)?.whole = true;
        for dir in &subdirs {
            state.watch_dir(dir)?.whole = true;
        }
        state.known.insert(path.to_owned());
        state.known.extend(subdirs);
        state.known.extend(known);

        debug!(dir = %path, watched = state.dirs.len(), "Tracking directory");
        Ok(())
    }

    /// Watches a single file through its parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the file doesn't exist, or
    /// [`WatchError::Notify`] if the parent can't be watched.
    pub fn track_file(&self, path: &Utf8Path) -> Result<(), WatchError> {
        if !path.exists() {
            return Err(WatchError::path_not_found(path));
        }
        let parent = path
            .parent()
            .ok_or_else(|| WatchError::path_not_found(path))?;

        let mut state = self.state.lock();
        state.released.remove(path);
        state.watch_dir(parent)?.files.insert(path.to_owned());
        state.known.insert(path.to_owned());

        debug!(path = %path, "Tracking file");
        Ok(())
    }

    /// Releases the watches for a directory subtree or a single file.
    ///
    /// If the path still exists and its parent is tracked whole, later
    /// changes to it are ignored instead of showing up as Created. Tracking
    /// it again, or deleting it, lifts that.
    pub fn untrack(&self, path: &Utf8Path) {
        let mut state = self.state.lock();
        state.release_prefix(path);
        let shadowed = path.parent().is_some_and(|p| state.watches_whole(p))
            && path.symlink_metadata().is_ok();
        if shadowed {
            state.released.insert(path.to_owned());
        }
        debug!(path = %path, shadowed, "Untracked");
    }

    /// Drops a path and everything beneath it from the live view.
    pub fn forget(&self, path: &Utf8Path) {
        self.state.lock().release_prefix(path);
        trace!(path = %path, "Forgot path");
    }

    /// Turns a batch of raw changed paths into watch events.
    ///
    /// Paths released by [`untrack`](Self::untrack) are dropped while they
    /// exist; once gone they are forgotten, so a later recreation is Created.
    /// Every other distinct path is checked against the disk and the live
    /// view:
    ///
    /// | on disk | known | event                                |
    /// |---------|-------|--------------------------------------|
    /// | yes     | yes   | Modified                             |
    /// | yes     | no    | Created, if its parent is tracked whole |
    /// | no      | yes   | Deleted                              |
    /// | no      | no    | dropped                              |
    ///
    /// Deletions come first, deepest first; then creations, shallowest
    /// first; then modifications. The live view is updated before returning.
    pub fn classify(&self, batch: &ChangeBatch) -> Vec<WatchEvent> {
        let mut state = self.state.lock();
        let mut events = Vec::with_capacity(batch.len());

        for path in batch.unique_paths() {
            let on_disk = path.symlink_metadata().is_ok();
            if state.is_released(path) {
                if on_disk {
                    trace!(path = %path, "Dropping change for untracked path");
                } else {
                    state.released.remove(path.as_path());
                }
                continue;
            }
            let known = state.known.contains(path.as_path());
            let parent = path.parent();

            let kind = match (on_disk, known) {
                (true, true) => WatchEventKind::Modified,
                (true, false) if parent.is_some_and(|p| state.watches_whole(p)) => {
                    WatchEventKind::Created
                }
                (true, false) => {
                    trace!(path = %path, "Dropping change outside tracked directories");
                    continue;
                }
                (false, true) => WatchEventKind::Deleted,
                (false, false) => {
                    trace!(path = %path, "Dropping change for vanished unknown path");
                    continue;
                }
            };

            let root = match parent {
                Some(parent) if state.dirs.contains_key(parent) => parent.to_owned(),
                _ => path.clone(),
            };
            events.push(WatchEvent::with_timestamp(
                kind,
                path.clone(),
                root,
                batch.received_at,
            ));
        }

        events.sort_by_key(|event| match event.kind {
            WatchEventKind::Deleted => (0, usize::MAX - event.depth()),
            WatchEventKind::Created => (1, event.depth()),
            WatchEventKind::Modified => (2, 0),
        });

        for event in &events {
            match event.kind {
                WatchEventKind::Created => {
                    state.known.insert(event.path.clone());
                }
                WatchEventKind::Deleted => state.release_prefix(&event.path),
                WatchEventKind::Modified => {}
            }
        }

        events
    }

    /// Returns `true` if the path is in the live view.
    #[must_use]
    pub fn is_known(&self, path: &Utf8Path) -> bool {
        self.state.lock().known.contains(path)
    }

    /// Returns the watched directories, sorted.
    #[must_use]
    pub fn watched_directories(&self) -> Vec<Utf8PathBuf> {
        let state = self.state.lock();
        let mut dirs: Vec<Utf8PathBuf> = state.dirs.keys().cloned().collect();
        dirs.sort();
        dirs
    }
}

/// Lists every non-hidden directory strictly below `root`.
fn discover_subdirectories(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(root = %root, %error, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.depth() > 0 && entry.file_type().is_some_and(|t| t.is_dir()))
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAllFilter;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> WatchConfig {
        WatchConfig {
            debounce_ms: 50,
            ..WatchConfig::default()
        }
    }

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    fn batch(paths: &[&Utf8Path]) -> ChangeBatch {
        paths.iter().map(|p| p.to_path_buf()).collect()
    }

    #[test]
    fn test_track_directory_watches_visible_subdirectories() {
        let (_dir, root) = temp_root();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, Vec::new()).unwrap();

        let watched = tracker.watched_directories();
        assert_eq!(watched, vec![root.clone(), root.join("a"), root.join("a/b")]);
        assert!(tracker.is_known(&root.join("a/b")));
        assert!(!tracker.is_known(&root.join(".git")));
    }

    #[test]
    fn test_track_missing_directory() {
        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        let err = tracker
            .track_directory(Utf8Path::new("/nonexistent/quarry"), Vec::new())
            .unwrap_err();
        assert!(matches!(err, WatchError::PathNotFound(_)));
    }

    #[test]
    fn test_classify_created_modified_deleted() {
        let (_dir, root) = temp_root();
        let kept = root.join("kept.txt");
        let gone = root.join("gone.txt");
        fs::write(&kept, "one").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker
            .track_directory(&root, vec![kept.clone(), gone.clone()])
            .unwrap();

        let fresh = root.join("fresh.txt");
        fs::write(&fresh, "two").unwrap();
        let phantom = root.join("phantom.txt");

        let events = tracker.classify(&batch(&[&kept, &fresh, &gone, &phantom]));
        let summary: Vec<(WatchEventKind, &str)> = events
            .iter()
            .map(|e| (e.kind, e.path.file_name().unwrap()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (WatchEventKind::Deleted, "gone.txt"),
                (WatchEventKind::Created, "fresh.txt"),
                (WatchEventKind::Modified, "kept.txt"),
            ]
        );
        assert!(events.iter().all(|e| e.root == root));

        assert!(tracker.is_known(&fresh));
        assert!(!tracker.is_known(&gone));
    }

    #[test]
    fn test_classify_orders_deletions_deepest_first() {
        let (_dir, root) = temp_root();
        let sub = root.join("sub");
        let nested = sub.join("deep.txt");

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker
            .track_directory(&root, vec![sub.clone(), nested.clone()])
            .unwrap();

        // Neither path exists on disk, both are known
        let events = tracker.classify(&batch(&[&sub, &nested]));
        let paths: Vec<&Utf8Path> = events.iter().map(|e| e.path.as_path()).collect();
        assert_eq!(paths, vec![nested.as_path(), sub.as_path()]);
        assert!(events.iter().all(|e| e.kind == WatchEventKind::Deleted));
    }

    #[test]
    fn test_classify_orders_creations_shallowest_first() {
        let (_dir, root) = temp_root();
        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, Vec::new()).unwrap();

        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        let file = root.join("a.txt");
        fs::write(&file, "x").unwrap();
        // The nested file's parent is not watched yet, so it is dropped
        let inner = sub.join("inner.txt");
        fs::write(&inner, "x").unwrap();

        let events = tracker.classify(&batch(&[&inner, &sub, &file]));
        let paths: Vec<&Utf8Path> = events.iter().map(|e| e.path.as_path()).collect();
        assert_eq!(paths, vec![file.as_path(), sub.as_path()]);
    }

    #[test]
    fn test_tracked_file_ignores_siblings() {
        let (_dir, root) = temp_root();
        let tracked = root.join("tracked.txt");
        let sibling = root.join("sibling.txt");
        fs::write(&tracked, "x").unwrap();
        fs::write(&sibling, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_file(&tracked).unwrap();
        assert_eq!(tracker.watched_directories(), vec![root.clone()]);

        let events = tracker.classify(&batch(&[&tracked, &sibling]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Modified);
        assert_eq!(events[0].path, tracked);
    }

    #[test]
    fn test_untrack_file_releases_parent_watch() {
        let (_dir, root) = temp_root();
        let tracked = root.join("tracked.txt");
        fs::write(&tracked, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_file(&tracked).unwrap();
        tracker.untrack(&tracked);

        assert!(tracker.watched_directories().is_empty());
        assert!(!tracker.is_known(&tracked));
    }

    #[test]
    fn test_untrack_directory_releases_subtree() {
        let (_dir, root) = temp_root();
        fs::create_dir_all(root.join("a/b")).unwrap();
        let file = root.join("a/b/c.txt");
        fs::write(&file, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, vec![file.clone()]).unwrap();
        tracker.untrack(&root.join("a"));

        assert_eq!(tracker.watched_directories(), vec![root.clone()]);
        assert!(!tracker.is_known(&file));
        assert!(tracker.is_known(&root));
    }

    #[test]
    fn test_forget_turns_next_change_into_created() {
        let (_dir, root) = temp_root();
        let file = root.join("a.txt");
        fs::write(&file, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, vec![file.clone()]).unwrap();
        tracker.forget(&file);

        let events = tracker.classify(&batch(&[&file]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Created);
    }

    #[test]
    fn test_untracked_path_stays_quiet_until_deleted() {
        let (_dir, root) = temp_root();
        let file = root.join("a.txt");
        fs::write(&file, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, vec![file.clone()]).unwrap();
        tracker.untrack(&file);

        fs::write(&file, "y").unwrap();
        assert!(tracker.classify(&batch(&[&file])).is_empty());

        fs::remove_file(&file).unwrap();
        assert!(tracker.classify(&batch(&[&file])).is_empty());

        fs::write(&file, "z").unwrap();
        let events = tracker.classify(&batch(&[&file]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Created);
    }

    #[test]
    fn test_untracked_subdirectory_ignores_nested_changes() {
        let (_dir, root) = temp_root();
        let sub = root.join("sub");
        fs::create_dir(&sub).unwrap();
        let inner = sub.join("inner.txt");
        fs::write(&inner, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, vec![inner.clone()]).unwrap();
        tracker.untrack(&sub);

        assert!(tracker.classify(&batch(&[&sub, &inner])).is_empty());
        assert_eq!(tracker.watched_directories(), vec![root.clone()]);
    }

    #[test]
    fn test_retracking_lifts_release() {
        let (_dir, root) = temp_root();
        let file = root.join("a.txt");
        fs::write(&file, "x").unwrap();

        let (tracker, _stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, vec![file.clone()]).unwrap();
        tracker.untrack(&file);
        tracker.track_file(&file).unwrap();

        let events = tracker.classify(&batch(&[&file]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, WatchEventKind::Modified);
    }

    #[tokio::test]
    async fn test_stream_receives_changes() {
        let (_dir, root) = temp_root();
        let (tracker, mut stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        tracker.track_directory(&root, Vec::new()).unwrap();

        let file = root.join("live.txt");
        fs::write(&file, "hello").unwrap();
        fs::write(root.join(".hidden"), "hello").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), stream.recv()).await;

        // Timing-dependent on the platform watcher backend
        if let Ok(Some(batch)) = received {
            assert!(batch.iter().all(|p| !HiddenFilter::is_hidden(p)));
            let events = tracker.classify(&batch);
            assert!(
                events
                    .iter()
                    .any(|e| e.kind == WatchEventKind::Created && e.path == file)
            );
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_tracker_dropped() {
        let (tracker, mut stream) = FileTracker::new(&config(), AcceptAllFilter).unwrap();
        drop(tracker);
        let received = tokio::time::timeout(Duration::from_secs(5), stream.recv()).await;
        assert!(matches!(received, Ok(None)));
    }
}
