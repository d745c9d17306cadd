//! Core types, configuration, and utilities for the quarry search index.
//!
//! This crate provides the foundational types shared by every other crate in
//! the workspace:
//!
//! - Inode types ([`Inode`], [`Document`], [`Directory`]) and their ids
//! - Token types ([`Token`], [`Positions`], [`Tokenization`])
//! - Configuration structures ([`Config`], [`IndexConfig`], [`WatchConfig`])
//! - The [`ConfigError`] type
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)
//!
//! # Crate Dependencies
//!
//! ```text
//! qr-cli ──► qr-index ──► qr-tokenize ──► qr-core
//!                     └─► qr-watcher ───────►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{Config, IndexConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
pub use types::{Directory, Document, Inode, InodeId, InodeKind, Positions, Token, Tokenization};
