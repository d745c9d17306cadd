//! An inverted index and inode registry kept in sync with the filesystem.
//!
//! This crate is the core of quarry. It tracks documents and directories,
//! tokenizes their content on a bounded worker pool, answers token, boolean
//! and phrase queries, and applies debounced filesystem changes as they
//! happen.
//!
//! # Overview
//!
//! - [`Reconciler`]: the entry point; owns everything below
//! - [`Registry`]: ids, paths, the directory hierarchy, tokenizer bindings
//! - [`TokenIndex`]: token to document postings with offsets
//! - [`WatchDispatcher`]: the background task applying watch events
//! - [`DirectoryWalker`]: lists what a directory contributes
//!
//! # Crate Dependencies
//!
//! ```text
//! qr-cli ──► qr-index ──► qr-tokenize ──► qr-core
//!                     └─► qr-watcher ───────►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use qr_core::{Config, Directory};
//! use qr_index::{AddOptions, Reconciler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qr_index::IndexError> {
//!     let reconciler = Reconciler::new(&Config::default())?;
//!     reconciler.add_directory(Directory::new("notes"), AddOptions::new().track(true))?;
//!
//!     let dispatcher = reconciler.start()?;
//!
//!     // Phrase query: tokens at consecutive offsets
//!     for document in reconciler.search("meeting notes") {
//!         println!("{}", document.path());
//!     }
//!
//!     // Boolean queries over already-normalized tokens
//!     let both = reconciler.search_and(&["budget", "review"])?;
//!     let either = reconciler.search_or(&["budget", "review"]);
//!     assert!(both.len() <= either.len());
//!
//!     dispatcher.shutdown().await
//! }
//! ```
//!
//! # Consistency
//!
//! The registry and the index each sit behind their own `RwLock`. Searches
//! hold the registry's read lock while they query the index, so every id
//! they see resolves; nothing ever holds the index lock while taking the
//! registry's. There is no transaction spanning both: a concurrent search
//! may briefly miss a document that is registered but not yet indexed.
//!
//! # Performance Considerations
//!
//! - **Tokenization** runs outside every lock, on a `rayon` pool sized by
//!   `IndexConfig::worker_threads`.
//! - **Directory adds** insert all postings under one write lock.
//! - **Removal** costs time proportional to the number of distinct tokens.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod index;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod stats;
pub mod walker;

pub use dispatch::WatchDispatcher;
pub use error::IndexError;
pub use index::{Postings, TokenIndex};
pub use reconciler::{AddOptions, Reconciler};
pub use record::Record;
pub use registry::{DirectoryInsert, Registry, RegistryReadGuard, RemovedDirectory};
pub use stats::{IndexStats, StatsSnapshot};
pub use walker::{DirectoryWalker, WalkEntry, is_binary};
