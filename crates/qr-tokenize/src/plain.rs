//! The default plain-text tokenizer.

use qr_core::Token;

use crate::tokenizer::Tokenizer;

/// Words dropped by [`PlainTextTokenizer`]: the ten most common in English.
pub const STOP_WORDS: &[&str] = &["the", "be", "to", "of", "and", "a", "in", "that", "have", "i"];

/// Splits text on anything other than ASCII letters and digits.
///
/// Tokens are lowercased, empty pieces are dropped, and so are the
/// [`STOP_WORDS`] unless [`keep_stop_words`](Self::keep_stop_words) is set.
///
/// # Examples
///
/// ```
/// use qr_tokenize::{PlainTextTokenizer, Tokenizer};
///
/// let tokenizer = PlainTextTokenizer::new();
/// let tokens: Vec<_> = tokenizer
///     .tokenize_str("To be, or NOT to be")
///     .into_iter()
///     .map(|t| t.to_string())
///     .collect();
/// assert_eq!(tokens, ["or", "not"]);
///
/// let verbatim = PlainTextTokenizer::new().keep_stop_words();
/// assert_eq!(verbatim.tokenize_str("To be").len(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PlainTextTokenizer {
    filter_stop_words: bool,
}

impl PlainTextTokenizer {
    /// Creates a tokenizer that filters stop words.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filter_stop_words: true,
        }
    }

    /// Keeps stop words in the output.
    #[must_use]
    pub const fn keep_stop_words(mut self) -> Self {
        self.filter_stop_words = false;
        self
    }

    fn is_stop_word(self, word: &str) -> bool {
        self.filter_stop_words && STOP_WORDS.contains(&word)
    }
}

impl Default for PlainTextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for PlainTextTokenizer {
    fn tokenize_str(&self, text: &str) -> Vec<Token> {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|piece| !piece.is_empty())
            .map(str::to_ascii_lowercase)
            .filter(|word| !self.is_stop_word(word))
            .map(Token::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use std::io::Cursor;

    const LOREM: &str = "Lorem ipsum dolor sit amet";

    #[test]
    fn test_basic_tokenization() {
        let text = format!("{LOREM} {LOREM}");
        let tokens = PlainTextTokenizer::new()
            .tokenize_reader(&mut Cursor::new(text.as_bytes()))
            .unwrap();

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens.get("lorem"), Some(&smallvec![0, 5]));
        assert_eq!(tokens.get("ipsum"), Some(&smallvec![1, 6]));
        assert_eq!(tokens.get("dolor"), Some(&smallvec![2, 7]));
        assert_eq!(tokens.get("sit"), Some(&smallvec![3, 8]));
        assert_eq!(tokens.get("amet"), Some(&smallvec![4, 9]));
    }

    #[test]
    fn test_latin1_bytes_split_like_separators() {
        // "café lorem" in ISO-8859-1: the 0xE9 byte decodes to U+FFFD
        let bytes: &[u8] = b"caf\xe9 lorem";
        let tokens = PlainTextTokenizer::new()
            .tokenize_reader(&mut Cursor::new(bytes))
            .unwrap();
        assert_eq!(tokens.get("caf"), Some(&smallvec![0]));
        assert_eq!(tokens.get("lorem"), Some(&smallvec![1]));
    }

    #[test]
    fn test_punctuation_and_digits() {
        let words: Vec<String> = PlainTextTokenizer::new()
            .tokenize_str("e-mail: v2.0_final!!")
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(words, ["e", "mail", "v2", "0", "final"]);
    }

    #[test]
    fn test_stop_words_filtered() {
        let tokens = PlainTextTokenizer::new().tokenize_str("I have a cat in the hat");
        let words: Vec<&str> = tokens.iter().map(Token::as_str).collect();
        assert_eq!(words, ["cat", "hat"]);
    }

    #[test]
    fn test_stop_words_do_not_consume_offsets() {
        let tokens = PlainTextTokenizer::new().tokenize_text("the hello the world");
        assert_eq!(tokens.get("hello"), Some(&smallvec![0]));
        assert_eq!(tokens.get("world"), Some(&smallvec![1]));
    }

    #[test]
    fn test_keep_stop_words() {
        let tokens = PlainTextTokenizer::new()
            .keep_stop_words()
            .tokenize_text("The end");
        assert_eq!(tokens.get("the"), Some(&smallvec![0]));
        assert_eq!(tokens.get("end"), Some(&smallvec![1]));
    }

    #[test]
    fn test_blank_input() {
        assert!(PlainTextTokenizer::new().tokenize_text("  ,,, \n\t").is_empty());
    }
}
