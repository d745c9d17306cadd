//! The change reconciler.
//!
//! [`Reconciler`] is the public entry point of the crate. It owns the
//! registry, the inverted index, the tokenization pool and the file tracker,
//! and keeps all of them consistent as documents are added, removed and
//! changed on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ Reconciler (Arc-shared, cheap to clone)                        │
//! │                                                                │
//! │  add_document / add_directory ──► Registry  (ids, hierarchy)   │
//! │            │                                                   │
//! │            └── rayon pool: tokenize ──► TokenIndex (postings)  │
//! │            └── FileTracker: watch                              │
//! │                                                                │
//! │  search ──► Registry read guard ─► TokenIndex read ─► resolve  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and may block on file I/O; async callers
//! should go through `tokio::task::spawn_blocking`. The watch-driven side
//! lives in [`crate::dispatch`] and is started with [`Reconciler::start`].

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use qr_core::{Config, Directory, Document, FxHashSet, Inode, Tokenization};
use qr_tokenize::{SharedTokenizer, TokenizeError, Tokenizer, default_tokenizer};
use qr_watcher::{AcceptAllFilter, FileFilter, FileTracker, WatchStream};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::dispatch::WatchDispatcher;
use crate::error::IndexError;
use crate::index::TokenIndex;
use crate::record::Record;
use crate::registry::Registry;
use crate::stats::IndexStats;

/// Options for [`Reconciler::add_document`] and [`Reconciler::add_directory`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use qr_index::AddOptions;
/// use qr_tokenize::PlainTextTokenizer;
///
/// let options = AddOptions::new()
///     .tokenizer(Arc::new(PlainTextTokenizer::new().keep_stop_words()))
///     .track(true);
/// assert!(options.is_tracked());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    tokenizer: Option<SharedTokenizer>,
    track: bool,
}

impl AddOptions {
    /// Creates options with no tokenizer override and tracking disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tokenizer stored for the added inode.
    ///
    /// Directories pass it on to every descendant without its own.
    #[must_use]
    pub fn tokenizer(mut self, tokenizer: SharedTokenizer) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Sets whether the added path is watched for changes.
    #[must_use]
    pub const fn track(mut self, track: bool) -> Self {
        self.track = track;
        self
    }

    /// Returns `true` if the added path will be watched.
    #[must_use]
    pub const fn is_tracked(&self) -> bool {
        self.track
    }
}

struct Inner {
    registry: Registry,
    index: TokenIndex,
    pool: ThreadPool,
    tokenizer: SharedTokenizer,
    tracker: FileTracker,
    stream: Mutex<Option<WatchStream>>,
    stats: IndexStats,
    config: Config,
}

/// Keeps the registry and the index in sync with the filesystem.
///
/// # Examples
///
/// ```no_run
/// use qr_core::{Config, Directory};
/// use qr_index::{AddOptions, Reconciler};
///
/// # async fn example() -> Result<(), qr_index::IndexError> {
/// let reconciler = Reconciler::new(&Config::default())?;
/// reconciler.add_directory(Directory::new("notes"), AddOptions::new().track(true))?;
///
/// let dispatcher = reconciler.start()?;
/// for document in reconciler.search("quarterly report") {
///     println!("{}", document.path());
/// }
/// dispatcher.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.inner.registry)
            .field("index", &self.inner.index)
            .field("workers", &self.inner.pool.current_num_threads())
            .field("tracker", &self.inner.tracker)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler that watches every non-hidden path.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] for an invalid configuration,
    /// [`IndexError::Pool`] if the worker pool can't be built, or
    /// [`IndexError::Watch`] if the file tracker fails to start.
    pub fn new(config: &Config) -> Result<Self, IndexError> {
        Self::with_filter(config, AcceptAllFilter)
    }

    /// Creates a reconciler whose tracker drops paths `filter` rejects.
    ///
    /// The filter only applies to watch events; explicit adds are not
    /// filtered.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_filter<F: FileFilter>(config: &Config, filter: F) -> Result<Self, IndexError> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.index.worker_threads.unwrap_or(0))
            .thread_name(|i| format!("quarry-tokenize-{i}"))
            .build()?;
        let (tracker, stream) = FileTracker::new(&config.watch, filter)?;

        debug!(
            workers = pool.current_num_threads(),
            debounce_ms = config.watch.debounce_ms,
            "Reconciler created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                registry: Registry::new(config.index),
                index: TokenIndex::new(),
                pool,
                tokenizer: default_tokenizer(),
                tracker,
                stream: Mutex::new(Some(stream)),
                stats: IndexStats::new(),
                config: *config,
            }),
        })
    }

    /// Registers a document, indexes its content, and optionally watches it.
    ///
    /// Tokenization runs on the worker pool while the caller waits. Adding a
    /// document that is already tracked re-indexes it under its existing id.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the path doesn't exist, leaving no
    /// state behind. A tokenization failure rolls back a fresh registration
    /// and is returned as [`IndexError::Tokenize`].
    pub fn add_document(
        &self,
        document: Document,
        options: AddOptions,
    ) -> Result<Record<Document>, IndexError> {
        let inner = &*self.inner;
        let (record, inserted) = inner
            .registry
            .insert_document(document, options.tokenizer.as_ref())?;

        let tokenizer = self.resolve_tokenizer(&record);
        let tokenization = match inner.pool.install(|| tokenizer.tokenize_path(record.path())) {
            Ok(tokenization) => tokenization,
            Err(error) => {
                if inserted {
                    inner.registry.remove_document(&record);
                }
                return Err(error.into());
            }
        };

        let tokens = tokenization.len();
        if inserted {
            inner.index.add(&record, tokenization);
        } else {
            inner.index.replace(&record, tokenization);
        }
        inner.stats.add_indexed(1);

        if options.track {
            inner.tracker.track_file(record.path())?;
        }

        debug!(id = %record.id(), path = %record.path(), tokens, "Indexed document");
        Ok(record)
    }

    /// Registers a directory, indexes every new document below it, and
    /// optionally watches the whole subtree.
    ///
    /// New documents are tokenized concurrently on the worker pool and
    /// inserted into the index in one batch. Documents that were already
    /// tracked are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] or [`IndexError::InvalidKind`] for a
    /// bad path. If some documents fail to tokenize, the rest are still
    /// indexed (and watched), the failures are dropped from the registry,
    /// and the first failure is returned.
    pub fn add_directory(
        &self,
        directory: Directory,
        options: AddOptions,
    ) -> Result<Record<Directory>, IndexError> {
        let inner = &*self.inner;
        let insert = inner.registry.add_directory(directory, options.tokenizer)?;
        let documents: Vec<Record<Document>> = insert.new_documents().collect();

        let results: Vec<(Record<Document>, Result<Tokenization, TokenizeError>)> =
            inner.pool.install(|| {
                documents
                    .into_par_iter()
                    .map(|record| {
                        let result = self.resolve_tokenizer(&record).tokenize_path(record.path());
                        (record, result)
                    })
                    .collect()
            });

        let mut indexed = Vec::with_capacity(results.len());
        let mut failed = FxHashSet::default();
        let mut first_error = None;
        for (record, result) in results {
            match result {
                Ok(tokenization) => indexed.push((record, tokenization)),
                Err(error) => {
                    warn!(path = %record.path(), %error, "Failed to tokenize document");
                    inner.stats.increment_errors();
                    inner.registry.remove_document(&record);
                    failed.insert(record.id());
                    first_error.get_or_insert(error);
                }
            }
        }

        let count = indexed.len();
        inner.index.add_all(indexed);
        inner.stats.add_indexed(count as u64);

        let root = insert.directory.path();
        if options.track {
            let known = insert
                .descendants
                .iter()
                .filter(|record| !failed.contains(&record.id()))
                .map(|record| record.path().to_owned());
            inner.tracker.track_directory(root, known)?;
        }

        info!(
            root = %root,
            documents = count,
            descendants = insert.descendants.len() - failed.len(),
            failed = failed.len(),
            "Indexed directory"
        );

        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(insert.directory),
        }
    }

    /// Stops tracking a document or a directory subtree.
    ///
    /// Returns the number of documents removed from the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotTracked`] if the record isn't registered.
    pub fn remove(&self, record: &Record) -> Result<usize, IndexError> {
        let inner = &*self.inner;
        let removed = match record.inode() {
            Inode::Document(document) => {
                let document = Record::new(record.id(), document.clone());
                inner
                    .registry
                    .remove_document(&document)
                    .ok_or_else(|| IndexError::not_tracked(document.path()))?;
                inner.index.remove(&document);
                1
            }
            Inode::Directory(directory) => {
                let directory = Record::new(record.id(), directory.clone());
                let removed = inner
                    .registry
                    .remove_directory(&directory)
                    .ok_or_else(|| IndexError::not_tracked(directory.path()))?;
                inner.index.remove_all(&removed.documents);
                removed.documents.len()
            }
        };

        inner.tracker.untrack(record.path());
        inner.stats.add_removed(removed as u64);
        debug!(id = %record.id(), path = %record.path(), documents = removed, "Removed");
        Ok(removed)
    }

    /// Searches free text with the default tokenizer.
    ///
    /// Text containing a space is a phrase query: its tokens must appear at
    /// consecutive offsets. Otherwise the first token is looked up on its
    /// own. Text without any token matches nothing.
    pub fn search(&self, text: &str) -> FxHashSet<Document> {
        let tokens = self.inner.tokenizer.tokenize_str(text);
        if text.contains(' ') {
            return self.search_and_consecutive(&tokens);
        }
        match tokens.first() {
            Some(token) => self.search_token(token.as_str()),
            None => FxHashSet::default(),
        }
    }

    /// Returns the documents containing `token`.
    pub fn search_token(&self, token: &str) -> FxHashSet<Document> {
        let registry = self.inner.registry.read();
        registry.documents(self.inner.index.search(token))
    }

    /// Returns the documents containing every given token.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyQuery`] if `tokens` is empty.
    pub fn search_and<T: Borrow<str>>(
        &self,
        tokens: &[T],
    ) -> Result<FxHashSet<Document>, IndexError> {
        let registry = self.inner.registry.read();
        Ok(registry.documents(self.inner.index.search_and(tokens)?))
    }

    /// Returns the documents containing any of the given tokens.
    pub fn search_or<T: Borrow<str>>(&self, tokens: &[T]) -> FxHashSet<Document> {
        let registry = self.inner.registry.read();
        registry.documents(self.inner.index.search_or(tokens))
    }

    /// Returns the documents containing the tokens as a phrase.
    pub fn search_and_consecutive<T: Borrow<str>>(&self, tokens: &[T]) -> FxHashSet<Document> {
        let registry = self.inner.registry.read();
        registry.documents(self.inner.index.search_and_consecutive(tokens))
    }

    /// Starts applying watch events in a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::AlreadyStarted`] if a dispatcher was started
    /// before.
    pub fn start(&self) -> Result<WatchDispatcher, IndexError> {
        let stream = self
            .inner
            .stream
            .lock()
            .take()
            .ok_or(IndexError::AlreadyStarted)?;
        Ok(WatchDispatcher::spawn(self.clone(), stream))
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Returns the inverted index.
    #[must_use]
    pub fn index(&self) -> &TokenIndex {
        &self.inner.index
    }

    /// Returns the reconciliation statistics.
    #[must_use]
    pub fn stats(&self) -> &IndexStats {
        &self.inner.stats
    }

    /// Returns the file tracker.
    #[must_use]
    pub fn tracker(&self) -> &FileTracker {
        &self.inner.tracker
    }

    /// Returns the configuration the reconciler was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn resolve_tokenizer<T>(&self, record: &Record<T>) -> SharedTokenizer {
        self.inner
            .registry
            .tokenizer_for(record)
            .unwrap_or_else(|| Arc::clone(&self.inner.tokenizer))
    }
}
