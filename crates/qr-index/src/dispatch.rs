//! Watch-driven reconciliation.
//!
//! [`WatchDispatcher`] runs one Tokio task that receives change batches
//! from the [`FileTracker`](qr_watcher::FileTracker), classifies them, and
//! applies each event to the registry and the index.
//!
//! ```text
//! debouncer thread ──► WatchStream ──► dispatch task ──► spawn_blocking
//!                                          │                 │
//!                                      shutdown           classify
//!                                     (oneshot)        apply events
//! ```
//!
//! A batch is applied on the blocking pool so file I/O never stalls the
//! runtime. Events within a batch run in order: deletions deepest first,
//! then creations shallowest first, then modifications.
//!
//! # Failure Handling
//!
//! Per-event tokenization and I/O failures are logged at warn level and
//! counted in [`IndexStats`](crate::IndexStats). An event whose path is
//! missing from the registry means the two have diverged: the task logs at
//! error level and stops, and [`WatchDispatcher::shutdown`] returns
//! [`IndexError::Diverged`].

use std::fmt;

use qr_core::{Directory, Document};
use qr_watcher::{BatchStats, ChangeBatch, WatchEvent, WatchEventKind, WatchStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::IndexError;
use crate::reconciler::{AddOptions, Reconciler};
use crate::walker::is_binary;

/// Handle to the background dispatch task.
///
/// Dropping the handle signals the task to stop without waiting for it.
pub struct WatchDispatcher {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), IndexError>>>,
}

impl fmt::Debug for WatchDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchDispatcher")
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl WatchDispatcher {
    pub(crate) fn spawn(reconciler: Reconciler, stream: WatchStream) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_dispatch_loop(reconciler, stream, shutdown_rx));
        debug!("Watch dispatcher started");
        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Returns `true` while the dispatch task is running.
    ///
    /// The task stops early if the index diverged from the filesystem.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the dispatch task and waits for it.
    ///
    /// A batch that is being applied is finished first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Diverged`] if a divergence stopped the task, or
    /// [`IndexError::Task`] if it panicked.
    pub async fn shutdown(mut self) -> Result<(), IndexError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have stopped on its own
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await??;
        }
        debug!("Watch dispatcher stopped");
        Ok(())
    }
}

impl Drop for WatchDispatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_dispatch_loop(
    reconciler: Reconciler,
    mut stream: WatchStream,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), IndexError> {
    loop {
        let batch = tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Dispatcher received shutdown signal");
                return Ok(());
            }
            batch = stream.recv() => batch,
        };
        let Some(batch) = batch else {
            debug!("Change stream closed");
            return Ok(());
        };

        let worker = reconciler.clone();
        tokio::task::spawn_blocking(move || worker.apply_batch(&batch)).await??;
    }
}

impl Reconciler {
    /// Classifies a batch and applies its events in order.
    ///
    /// Stops at the first fatal error.
    pub(crate) fn apply_batch(&self, batch: &ChangeBatch) -> Result<(), IndexError> {
        let events = self.tracker().classify(batch);
        if events.is_empty() {
            return Ok(());
        }

        let counts = BatchStats::from_events(&events);
        self.stats().record_batch(&counts);
        debug!(
            changed = batch.len(),
            created = counts.created,
            modified = counts.modified,
            deleted = counts.deleted,
            "Applying change batch"
        );

        for event in &events {
            match self.apply_event(event) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    error!(path = %event.path, kind = %event.kind, error = %err, "Index diverged, stopping dispatcher");
                    return Err(err);
                }
                Err(err) => {
                    warn!(path = %event.path, kind = %event.kind, error = %err, "Failed to apply change");
                    self.stats().increment_errors();
                }
            }
        }
        Ok(())
    }

    fn apply_event(&self, event: &WatchEvent) -> Result<(), IndexError> {
        match event.kind {
            WatchEventKind::Created => self.apply_created(event),
            WatchEventKind::Modified => self.apply_modified(event),
            WatchEventKind::Deleted => self.apply_deleted(event),
        }
    }

    fn apply_created(&self, event: &WatchEvent) -> Result<(), IndexError> {
        if self.registry().get_path(&event.root).is_none() {
            return Err(IndexError::diverged(
                &event.path,
                "root directory of created path is not registered",
            ));
        }

        let path = &event.path;
        let is_symlink = path
            .symlink_metadata()
            .is_ok_and(|meta| meta.file_type().is_symlink());
        if is_symlink && !self.config().index.follow_links {
            debug!(path = %path, "Ignoring created symlink");
            self.tracker().forget(path);
            return Ok(());
        }

        let is_dir = path.is_dir();
        if !is_dir && self.config().index.skip_binary && is_binary(path) {
            debug!(path = %path, "Ignoring created binary file");
            self.tracker().forget(path);
            return Ok(());
        }

        let result = if is_dir {
            self.add_directory(Directory::new(path.clone()), AddOptions::new().track(true))
                .map(drop)
        } else {
            // The parent's watch already covers the file
            self.add_document(Document::new(path.clone()), AddOptions::new())
                .map(drop)
        };

        // A partially indexed directory stays registered and watched
        if result.is_err() && self.registry().get_path(path).is_none() {
            self.tracker().forget(path);
        }
        result
    }

    fn apply_modified(&self, event: &WatchEvent) -> Result<(), IndexError> {
        let record = self
            .registry()
            .get_path(&event.path)
            .ok_or_else(|| IndexError::diverged(&event.path, "modified path is not registered"))?;

        let Some(document) = record.into_document() else {
            return Ok(());
        };
        let tokenization = self.resolve_tokenizer(&document).tokenize_path(document.path())?;
        self.index().replace(&document, tokenization);
        self.stats().add_indexed(1);
        debug!(id = %document.id(), path = %document.path(), "Re-indexed document");
        Ok(())
    }

    fn apply_deleted(&self, event: &WatchEvent) -> Result<(), IndexError> {
        let record = self
            .registry()
            .get_path(&event.path)
            .ok_or_else(|| IndexError::diverged(&event.path, "deleted path is not registered"))?;
        self.remove(&record).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::{Utf8Path, Utf8PathBuf};
    use qr_core::{Config, IndexConfig, WatchConfig};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    fn write(path: &Utf8Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn reconciler() -> Reconciler {
        let config = Config {
            index: IndexConfig {
                worker_threads: Some(2),
                ..IndexConfig::default()
            },
            watch: WatchConfig {
                debounce_ms: 100,
                ..WatchConfig::default()
            },
        };
        Reconciler::new(&config).unwrap()
    }

    fn batch(paths: &[&Utf8Path]) -> ChangeBatch {
        paths.iter().map(|p| p.to_path_buf()).collect()
    }

    /// Polls `check` until it holds or roughly five seconds pass.
    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        check()
    }

    #[test]
    fn test_apply_batch_create_modify_delete() {
        let (_dir, root) = temp_root();
        write(&root.join("a.txt"), "granite");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        let b = root.join("b.txt");
        write(&b, "basalt");
        reconciler.apply_batch(&batch(&[&b])).unwrap();
        assert_eq!(reconciler.search("basalt").len(), 1);

        write(&b, "obsidian");
        reconciler.apply_batch(&batch(&[&b])).unwrap();
        assert!(reconciler.search("basalt").is_empty());
        assert_eq!(reconciler.search("obsidian").len(), 1);

        fs::remove_file(&b).unwrap();
        reconciler.apply_batch(&batch(&[&b])).unwrap();
        assert!(reconciler.search("obsidian").is_empty());
        assert_eq!(reconciler.registry().size(), 2);

        let snap = reconciler.stats().snapshot();
        assert_eq!((snap.created, snap.modified, snap.deleted), (1, 1, 1));
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn test_created_directory_indexes_contents() {
        let (_dir, root) = temp_root();
        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        let sub = root.join("sub");
        let nested = sub.join("deep/c.txt");
        write(&nested, "pumice");
        reconciler.apply_batch(&batch(&[&sub, &nested])).unwrap();

        assert_eq!(reconciler.search("pumice").len(), 1);
        assert!(reconciler.registry().get_path(&sub.join("deep")).is_some());
        assert!(reconciler.tracker().watched_directories().contains(&sub.join("deep")));
    }

    #[test]
    fn test_deleted_directory_cascades() {
        let (_dir, root) = temp_root();
        write(&root.join("keep.txt"), "slate");
        write(&root.join("sub/a.txt"), "slate shale");
        write(&root.join("sub/deep/b.txt"), "shale");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        let sub = root.join("sub");
        fs::remove_dir_all(&sub).unwrap();
        reconciler
            .apply_batch(&batch(&[&sub.join("deep/b.txt"), &sub, &sub.join("a.txt")]))
            .unwrap();

        assert!(reconciler.search("shale").is_empty());
        assert_eq!(reconciler.search("slate").len(), 1);
        assert_eq!(reconciler.registry().size(), 2);
        assert!(!reconciler.tracker().watched_directories().contains(&sub));
    }

    #[test]
    fn test_created_binary_file_is_skipped() {
        let (_dir, root) = temp_root();
        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        let blob = root.join("blob.bin");
        fs::write(&blob, [0x00, 0x01, 0x02]).unwrap();
        reconciler.apply_batch(&batch(&[&blob])).unwrap();

        assert!(reconciler.registry().get_path(&blob).is_none());
        assert!(!reconciler.tracker().is_known(&blob));
    }

    #[test]
    fn test_removed_document_stays_removed_on_change() {
        let (_dir, root) = temp_root();
        let path = root.join("a.txt");
        write(&path, "granite");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();
        let record = reconciler.registry().get_path(&path).unwrap();
        assert_eq!(reconciler.remove(&record).unwrap(), 1);

        write(&path, "granite basalt");
        reconciler.apply_batch(&batch(&[&path])).unwrap();
        assert!(reconciler.search("granite").is_empty());
        assert!(reconciler.registry().get_path(&path).is_none());

        // A real delete and recreate is picked up again
        fs::remove_file(&path).unwrap();
        reconciler.apply_batch(&batch(&[&path])).unwrap();
        write(&path, "basalt");
        reconciler.apply_batch(&batch(&[&path])).unwrap();
        assert_eq!(reconciler.search("basalt").len(), 1);
        assert_eq!(reconciler.stats().snapshot().errors, 0);
    }

    #[test]
    fn test_unreadable_change_is_counted_not_fatal() {
        let (_dir, root) = temp_root();
        let path = root.join("a.txt");
        write(&path, "quartz");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        // Replaced by a directory: still known, but no longer readable as text
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        reconciler.apply_batch(&batch(&[&path])).unwrap();
        assert_eq!(reconciler.stats().snapshot().errors, 1);
    }

    #[test]
    fn test_unregistered_modified_path_diverges() {
        let (_dir, root) = temp_root();
        let path = root.join("a.txt");
        write(&path, "mica");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();

        // Drop the record behind the tracker's back
        let record = reconciler
            .registry()
            .get_path(&path)
            .and_then(|r| r.into_document())
            .unwrap();
        reconciler.registry().remove_document(&record);

        let err = reconciler.apply_batch(&batch(&[&path])).unwrap_err();
        assert!(matches!(err, IndexError::Diverged { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatcher_follows_filesystem() {
        let (_dir, root) = temp_root();
        write(&root.join("a.txt"), "granite");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();
        let dispatcher = reconciler.start().unwrap();
        assert!(matches!(reconciler.start(), Err(IndexError::AlreadyStarted)));

        let b = root.join("b.txt");
        write(&b, "basalt");
        assert!(eventually(|| reconciler.search("basalt").len() == 1).await);

        write(&b, "obsidian");
        assert!(
            eventually(|| {
                reconciler.search("basalt").is_empty() && reconciler.search("obsidian").len() == 1
            })
            .await
        );

        fs::remove_file(&b).unwrap();
        assert!(eventually(|| reconciler.search("obsidian").is_empty()).await);

        assert!(dispatcher.is_running());
        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatcher_stops_on_divergence() {
        let (_dir, root) = temp_root();
        let path = root.join("a.txt");
        write(&path, "mica");

        let reconciler = reconciler();
        reconciler
            .add_directory(Directory::new(&root), AddOptions::new().track(true))
            .unwrap();
        let record = reconciler
            .registry()
            .get_path(&path)
            .and_then(|r| r.into_document())
            .unwrap();
        reconciler.registry().remove_document(&record);

        let dispatcher = reconciler.start().unwrap();
        write(&path, "feldspar");
        assert!(eventually(|| !dispatcher.is_running()).await);

        let err = dispatcher.shutdown().await.unwrap_err();
        assert!(matches!(err, IndexError::Diverged { .. }));
    }
}
