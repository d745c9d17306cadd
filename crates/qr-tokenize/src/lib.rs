//! Pluggable streaming tokenizers for the quarry search index.
//!
//! A tokenizer turns raw document content into a [`Tokenization`]: every
//! normalized [`Token`] together with the ascending offsets at which it
//! occurs. The index only ever sees tokenizations, so swapping the algorithm
//! (for source code, for another language, for non-text content) means
//! implementing [`Tokenizer`] and nothing else.
//!
//! # Overview
//!
//! ```
//! use qr_tokenize::{PlainTextTokenizer, Tokenizer};
//!
//! let tokenizer = PlainTextTokenizer::new();
//! let tokens = tokenizer.tokenize_text("The quick brown fox. The lazy dog!");
//!
//! // Stop words are dropped and the rest is case-folded
//! assert!(tokens.get("the").is_none());
//! assert_eq!(tokens.get("quick").map(|p| p.as_slice()), Some(&[0][..]));
//! assert_eq!(tokens.get("dog").map(|p| p.as_slice()), Some(&[4][..]));
//! ```
//!
//! # Streaming Offsets
//!
//! [`Tokenizer::tokenize_reader`] reads its input one line at a time, so
//! large files are never held in memory at once. The offset counter is
//! shared across lines: the n-th token of the whole stream has position n,
//! regardless of how the stream is broken into lines. Phrase queries rely on
//! this to match across line breaks.
//!
//! # Thread Safety
//!
//! Tokenizers are `Send + Sync` and are shared as [`SharedTokenizer`]
//! (`Arc<dyn Tokenizer>`) between the registry and the worker pool.
//!
//! [`Token`]: qr_core::Token
//! [`Tokenization`]: qr_core::Tokenization

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
mod plain;
mod tokenizer;

pub use error::TokenizeError;
pub use plain::{PlainTextTokenizer, STOP_WORDS};
pub use tokenizer::{SharedTokenizer, Tokenizer, default_tokenizer};
