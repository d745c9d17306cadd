//! Debounced per-path change tracking for the quarry search index.
//!
//! This crate watches the directories and files the index tracks, coalesces
//! their changes through `notify-debouncer-mini`, and classifies the changed
//! paths into Created, Modified and Deleted events.
//!
//! # Overview
//!
//! - [`FileTracker`] owns the debouncer and the set of watches, and keeps a
//!   live view of which tracked paths exist
//! - [`WatchStream`] delivers raw [`ChangeBatch`]es into async code
//! - [`FileTracker::classify`] turns a batch into ordered [`WatchEvent`]s
//! - [`FileFilter`] implementations drop uninteresting paths at the source
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
//! use qr_watcher::{ExtensionFilter, FileTracker, WatchEventKind};
//! use qr_core::WatchConfig;
//! use camino::Utf8Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WatchConfig::default(); // 500ms coalescing delay
//!     let filter = ExtensionFilter::new(&["txt", "md"]);
//!     let (tracker, mut stream) = FileTracker::new(&config, filter)?;
//!
//!     tracker.track_directory(Utf8Path::new("/home/me/notes"), Vec::new())?;
//!
//!     while let Some(batch) = stream.recv().await {
//!         for event in tracker.classify(&batch) {
//!             if event.kind == WatchEventKind::Deleted {
//!                 println!("gone: {}", event.path);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Performance Considerations
//!
//! - **Debouncing**: rapid writes to one file collapse into a single change.
//! - **Filtering at Source**: hidden and filtered paths are dropped on the
//!   debouncer thread, before they reach the channel.
//! - **Bounded Channel**: `WatchConfig::channel_capacity` batches at most;
//!   a slow consumer applies backpressure to the debouncer thread.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod tracker;

pub use error::WatchError;
pub use events::{BatchStats, ChangeBatch, WatchEvent, WatchEventKind};
pub use filter::{AcceptAllFilter, CompositeFilter, ExtensionFilter, FileFilter, HiddenFilter};
pub use tracker::{FileTracker, WatchStream};
