//! The inverted index.
//!
//! [`TokenIndex`] maps every token to the documents containing it and the
//! ascending offsets at which it occurs in each. It stores ids only; the
//! registry resolves them back to documents.

use std::borrow::Borrow;
use std::fmt;

use parking_lot::RwLock;
use qr_core::{Document, FxHashMap, FxHashSet, InodeId, Positions, Token, Tokenization};

use crate::error::IndexError;
use crate::record::Record;

/// The postings of one token: document id to ascending offsets.
pub type Postings = FxHashMap<InodeId, Positions>;

/// An inverted index from tokens to postings.
///
/// Mutators take the write lock once per call, searches take the read lock.
///
/// # Examples
///
/// ```
/// use qr_index::TokenIndex;
///
/// let index = TokenIndex::new();
/// assert!(index.search("anything").is_empty());
/// assert_eq!(index.size_tokens(), 0);
/// ```
#[derive(Default)]
pub struct TokenIndex {
    postings: RwLock<FxHashMap<Token, Postings>>,
}

impl fmt::Debug for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIndex")
            .field("tokens", &self.size_tokens())
            .finish_non_exhaustive()
    }
}

impl TokenIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document's tokenization.
    ///
    /// Postings for tokens the document already had are overwritten; other
    /// postings of the document are left alone. Use
    /// [`replace`](Self::replace) to drop stale tokens as well.
    pub fn add(&self, record: &Record<Document>, tokenization: Tokenization) {
        let mut postings = self.postings.write();
        insert(&mut postings, record.id(), tokenization);
    }

    /// Adds many tokenizations under one write lock.
    pub fn add_all(&self, batch: impl IntoIterator<Item = (Record<Document>, Tokenization)>) {
        let mut postings = self.postings.write();
        for (record, tokenization) in batch {
            insert(&mut postings, record.id(), tokenization);
        }
    }

    /// Removes a document from every posting.
    ///
    /// Returns the tokens that no longer reference any document and were
    /// dropped from the index.
    pub fn remove(&self, record: &Record<Document>) -> Vec<Token> {
        let mut postings = self.postings.write();
        evict(&mut postings, |id| id == record.id())
    }

    /// Removes many documents under one write lock.
    ///
    /// Returns every token that was dropped from the index.
    pub fn remove_all<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Record<Document>>,
    ) -> Vec<Token> {
        let ids: FxHashSet<InodeId> = records.into_iter().map(Record::id).collect();
        if ids.is_empty() {
            return Vec::new();
        }
        let mut postings = self.postings.write();
        evict(&mut postings, |id| ids.contains(&id))
    }

    /// Swaps a document's postings for a new tokenization in one step.
    ///
    /// Readers see either the old postings or the new ones, never a
    /// document that is missing from both.
    pub fn replace(&self, record: &Record<Document>, tokenization: Tokenization) {
        let mut postings = self.postings.write();
        evict(&mut postings, |id| id == record.id());
        insert(&mut postings, record.id(), tokenization);
    }

    /// Returns the documents containing `token`.
    pub fn search(&self, token: &str) -> FxHashSet<InodeId> {
        self.postings
            .read()
            .get(token)
            .map(|postings| postings.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the postings of every given token.
    ///
    /// Absent tokens map to an empty posting; duplicates collapse.
    pub fn search_all<T: Borrow<str>>(&self, tokens: &[T]) -> FxHashMap<Token, Postings> {
        let index = self.postings.read();
        tokens
            .iter()
            .map(|token| {
                let token = token.borrow();
                let postings = index.get(token).cloned().unwrap_or_default();
                (Token::new(token), postings)
            })
            .collect()
    }

    /// Returns the documents containing every given token.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::EmptyQuery`] if `tokens` is empty.
    pub fn search_and<T: Borrow<str>>(
        &self,
        tokens: &[T],
    ) -> Result<FxHashSet<InodeId>, IndexError> {
        let (first, rest) = tokens.split_first().ok_or(IndexError::EmptyQuery)?;
        let index = self.postings.read();

        let Some(first) = index.get(first.borrow()) else {
            return Ok(FxHashSet::default());
        };
        let mut matched: FxHashSet<InodeId> = first.keys().copied().collect();
        for token in rest {
            let Some(postings) = index.get(token.borrow()) else {
                return Ok(FxHashSet::default());
            };
            matched.retain(|id| postings.contains_key(id));
            if matched.is_empty() {
                break;
            }
        }
        Ok(matched)
    }

    /// Returns the documents containing any of the given tokens.
    pub fn search_or<T: Borrow<str>>(&self, tokens: &[T]) -> FxHashSet<InodeId> {
        let index = self.postings.read();
        tokens
            .iter()
            .filter_map(|token| index.get(token.borrow()))
            .flat_map(|postings| postings.keys().copied())
            .collect()
    }

    /// Returns the documents containing the tokens at consecutive offsets,
    /// in order.
    ///
    /// An empty query matches nothing.
    pub fn search_and_consecutive<T: Borrow<str>>(&self, tokens: &[T]) -> FxHashSet<InodeId> {
        let Some((first, rest)) = tokens.split_first() else {
            return FxHashSet::default();
        };
        let index = self.postings.read();
        let Some(first) = index.get(first.borrow()) else {
            return FxHashSet::default();
        };
        let rest: Option<Vec<&Postings>> = rest.iter().map(|t| index.get(t.borrow())).collect();
        let Some(rest) = rest else {
            return FxHashSet::default();
        };

        first
            .iter()
            .filter(|(id, positions)| {
                let mut running: Vec<u32> = positions.to_vec();
                for postings in &rest {
                    let Some(next) = postings.get(*id) else {
                        return false;
                    };
                    running = running
                        .into_iter()
                        .filter_map(|p| p.checked_add(1))
                        .filter(|p| next.binary_search(p).is_ok())
                        .collect();
                    if running.is_empty() {
                        return false;
                    }
                }
                true
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Returns the number of distinct tokens.
    pub fn size_tokens(&self) -> usize {
        self.postings.read().len()
    }

    /// Returns the number of distinct indexed documents.
    pub fn size_documents(&self) -> usize {
        let index = self.postings.read();
        let documents: FxHashSet<InodeId> = index
            .values()
            .flat_map(|postings| postings.keys().copied())
            .collect();
        documents.len()
    }
}

fn insert(index: &mut FxHashMap<Token, Postings>, id: InodeId, tokenization: Tokenization) {
    for (token, positions) in tokenization {
        if positions.is_empty() {
            continue;
        }
        index.entry(token).or_default().insert(id, positions);
    }
}

fn evict(index: &mut FxHashMap<Token, Postings>, matches: impl Fn(InodeId) -> bool) -> Vec<Token> {
    let mut evicted = Vec::new();
    index.retain(|token, postings| {
        postings.retain(|id, _| !matches(*id));
        if postings.is_empty() {
            evicted.push(token.clone());
            false
        } else {
            true
        }
    });
    evicted
}
