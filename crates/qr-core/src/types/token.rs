//! Tokens and tokenizations.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::hash::FxHashMap;

/// Ascending token offsets within one document.
///
/// Most tokens occur only a handful of times per document, so up to four
/// offsets are stored inline.
pub type Positions = SmallVec<[u32; 4]>;

/// The result of tokenizing one document: every token with its offsets.
pub type Tokenization = FxHashMap<Token, Positions>;

/// A normalized unit of text used as an index key.
///
/// `Token` borrows as `str`, so maps keyed by tokens can be queried with
/// plain string slices.
///
/// # Examples
///
/// ```
/// use qr_core::{Token, Tokenization, Positions};
///
/// let mut tokens = Tokenization::default();
/// tokens.insert(Token::from("hello"), Positions::from_slice(&[0, 3]));
///
/// assert_eq!(tokens.get("hello").map(|p| p.len()), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Creates a token from an already-normalized string.
    #[must_use]
    pub fn new(representation: impl Into<String>) -> Self {
        Self(representation.into())
    }

    /// Returns the token's text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Token {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
