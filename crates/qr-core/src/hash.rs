//! Fast hash map and hash set type aliases.
//!
//! Every table in the index is keyed by either an [`InodeId`](crate::InodeId)
//! (a small integer) or a [`Token`](crate::Token) (a short string). Both are
//! internal keys that never come from an untrusted network peer, so the
//! `rustc-hash` Fx algorithm is used instead of the DoS-resistant default.
//!
//! # Examples
//!
//! ```
//! use qr_core::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
//!
//! let mut postings: FxHashMap<u64, Vec<u32>> = fx_hash_map();
//! postings.insert(1, vec![0, 4]);
//!
//! let ids: FxHashSet<u64> = postings.keys().copied().collect();
//! assert!(ids.contains(&1));
//! assert!(fx_hash_set::<u64>().is_empty());
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// Creates a new empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

/// Creates a new empty [`FxHashSet`].
#[inline]
#[must_use]
pub fn fx_hash_set<V>() -> FxHashSet<V> {
    FxHashSet::default()
}
