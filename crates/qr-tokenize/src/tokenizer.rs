//! The tokenizer capability.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use camino::Utf8Path;
use qr_core::{Token, Tokenization};
use tracing::trace;

use crate::error::TokenizeError;
use crate::plain::PlainTextTokenizer;

/// A tokenizer shared between the registry and the worker pool.
pub type SharedTokenizer = Arc<dyn Tokenizer>;

/// Returns the tokenizer used when no other capability was registered.
///
/// # Examples
///
/// ```
/// use qr_tokenize::default_tokenizer;
///
/// let tokenizer = default_tokenizer();
/// assert_eq!(tokenizer.tokenize_str("Hello, World").len(), 2);
/// ```
#[must_use]
pub fn default_tokenizer() -> SharedTokenizer {
    Arc::new(PlainTextTokenizer::new())
}

/// Turns document content into tokens with positions.
///
/// Implementors only provide [`tokenize_str`](Self::tokenize_str), which
/// splits and normalizes one chunk of text. The provided methods layer the
/// streaming offset contract on top of it.
///
/// # Examples
///
/// ```
/// use qr_core::Token;
/// use qr_tokenize::Tokenizer;
///
/// /// Splits on whitespace only, keeping case.
/// #[derive(Debug)]
/// struct Whitespace;
///
/// impl Tokenizer for Whitespace {
///     fn tokenize_str(&self, text: &str) -> Vec<Token> {
///         text.split_whitespace().map(Token::from).collect()
///     }
/// }
///
/// let tokens = Whitespace.tokenize_text("a B\na");
/// assert_eq!(tokens.get("a").map(|p| p.as_slice()), Some(&[0, 2][..]));
/// assert_eq!(tokens.get("B").map(|p| p.as_slice()), Some(&[1][..]));
/// ```
pub trait Tokenizer: Send + Sync + fmt::Debug {
    /// Splits and normalizes one chunk of text, in order of appearance.
    fn tokenize_str(&self, text: &str) -> Vec<Token>;

    /// Tokenizes an in-memory string with stream offsets.
    ///
    /// Equivalent to [`tokenize_reader`](Self::tokenize_reader) over the
    /// string's bytes.
    fn tokenize_text(&self, text: &str) -> Tokenization {
        let mut offsets = OffsetCounter::default();
        for line in text.split('\n') {
            if !offsets.push_line(self.tokenize_str(line)) {
                tracing::warn!("Token offsets exhausted, truncating text");
                break;
            }
        }
        offsets.finish()
    }

    /// Tokenizes a stream line by line.
    ///
    /// The offset counter runs across lines. Invalid UTF-8 is decoded
    /// lossily.
    ///
    /// # Errors
    ///
    /// Returns the reader's I/O error, or [`io::ErrorKind::InvalidData`]
    /// if the stream has more tokens than a `u32` offset can address.
    fn tokenize_reader(&self, reader: &mut dyn BufRead) -> io::Result<Tokenization> {
        let mut offsets = OffsetCounter::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&line);
            if !offsets.push_line(self.tokenize_str(&text)) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "document has more tokens than offsets can address",
                ));
            }
        }
        Ok(offsets.finish())
    }

    /// Opens and tokenizes a file.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizeError::Read`] if the file can't be opened or read.
    fn tokenize_path(&self, path: &Utf8Path) -> Result<Tokenization, TokenizeError> {
        let file = File::open(path).map_err(|e| TokenizeError::read(path, e))?;
        let mut reader = BufReader::new(file);
        let tokens = self
            .tokenize_reader(&mut reader)
            .map_err(|e| TokenizeError::read(path, e))?;
        trace!(path = %path, distinct = tokens.len(), "Tokenized document");
        Ok(tokens)
    }
}

/// Accumulates tokens under a running offset.
#[derive(Default)]
struct OffsetCounter {
    tokens: Tokenization,
    next: u32,
    exhausted: bool,
}

impl OffsetCounter {
    /// Records one line's tokens. Returns `false` once offsets run out.
    fn push_line(&mut self, line: Vec<Token>) -> bool {
        for token in line {
            if self.exhausted {
                return false;
            }
            self.tokens.entry(token).or_default().push(self.next);
            match self.next.checked_add(1) {
                Some(next) => self.next = next,
                None => self.exhausted = true,
            }
        }
        true
    }

    fn finish(self) -> Tokenization {
        self.tokens
    }
}
