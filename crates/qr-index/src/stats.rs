//! Reconciliation statistics with atomic counters.
//!
//! This module provides [`IndexStats`], updated by the reconciler as it
//! indexes documents and applies watch events, and [`StatsSnapshot`] for
//! point-in-time views.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. Statistics are informational and don't order other memory
//! operations.
//!
//! # Examples
//!
//! ```
//! use qr_index::IndexStats;
//!
//! let stats = IndexStats::new();
//! stats.add_indexed(3);
//! stats.increment_errors();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.indexed, 3);
//! assert_eq!(snapshot.errors, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use qr_watcher::BatchStats;
use serde::{Deserialize, Serialize};

/// Atomic counters for reconciliation statistics.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Documents tokenized and added to the index, re-tokenizations included.
    indexed: AtomicU64,
    /// Documents removed from the index.
    removed: AtomicU64,
    /// Created events applied.
    created: AtomicU64,
    /// Modified events applied.
    modified: AtomicU64,
    /// Deleted events applied.
    deleted: AtomicU64,
    /// Operations that failed with a recoverable error.
    errors: AtomicU64,
}

impl IndexStats {
    /// Creates a new [`IndexStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the indexed documents counter.
    #[inline]
    pub fn add_indexed(&self, count: u64) {
        self.indexed.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds to the removed documents counter.
    #[inline]
    pub fn add_removed(&self, count: u64) {
        self.removed.fetch_add(count, Ordering::Relaxed);
    }

    /// Adds the event counts of one classified batch.
    pub fn record_batch(&self, batch: &BatchStats) {
        self.created.fetch_add(batch.created as u64, Ordering::Relaxed);
        self.modified.fetch_add(batch.modified as u64, Ordering::Relaxed);
        self.deleted.fetch_add(batch.deleted as u64, Ordering::Relaxed);
    }

    /// Increments the error counter.
    #[inline]
    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all statistics.
    ///
    /// Counters are read one at a time, so a snapshot taken while events
    /// are being applied may mix values from before and after one event.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            indexed: self.indexed.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            modified: self.modified.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.indexed.store(0, Ordering::Relaxed);
        self.removed.store(0, Ordering::Relaxed);
        self.created.store(0, Ordering::Relaxed);
        self.modified.store(0, Ordering::Relaxed);
        self.deleted.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of reconciliation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Documents tokenized and added to the index.
    pub indexed: u64,
    /// Documents removed from the index.
    pub removed: u64,
    /// Created events applied.
    pub created: u64,
    /// Modified events applied.
    pub modified: u64,
    /// Deleted events applied.
    pub deleted: u64,
    /// Recoverable failures.
    pub errors: u64,
}

impl StatsSnapshot {
    /// Returns the total number of watch events seen.
    #[must_use]
    pub const fn events(&self) -> u64 {
        self.created + self.modified + self.deleted
    }
}
