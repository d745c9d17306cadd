//! The inode registry.
//!
//! This module provides [`Registry`], the single source of truth for which
//! documents and directories are tracked, the ids assigned to them, their
//! parent/child structure, and the tokenizer each one was registered with.
//!
//! # Locking
//!
//! All state sits behind one [`parking_lot::RwLock`]. Mutations take the
//! write lock once per call; lookups take the read lock. Filesystem access
//! (canonicalization, existence checks, directory walks) happens before the
//! lock is taken, so the lock is only ever held for in-memory work.
//!
//! [`Registry::read`] hands out the read lock itself as a
//! [`RegistryReadGuard`], so a caller can run an index query and resolve the
//! resulting ids against one consistent snapshot.

use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::{RwLock, RwLockReadGuard};
use qr_core::{Directory, Document, FxHashMap, FxHashSet, IndexConfig, Inode, InodeId, InodeKind};
use qr_tokenize::SharedTokenizer;
use tracing::debug;

use crate::error::IndexError;
use crate::record::Record;
use crate::walker::DirectoryWalker;

#[derive(Default)]
struct RegistryState {
    by_id: FxHashMap<InodeId, Record>,
    by_path: FxHashMap<Utf8PathBuf, InodeId>,
    /// Immediate children of each directory.
    children: FxHashMap<InodeId, FxHashSet<InodeId>>,
    tokenizers: FxHashMap<InodeId, SharedTokenizer>,
    next_id: u64,
}

impl RegistryState {
    fn insert_document(
        &mut self,
        path: Utf8PathBuf,
        tokenizer: Option<&SharedTokenizer>,
    ) -> Record<Document> {
        let document = Document::new(path);
        let id = self.insert(document.clone().into(), tokenizer).id();
        Record::new(id, document)
    }

    fn insert(&mut self, inode: Inode, tokenizer: Option<&SharedTokenizer>) -> Record {
        let id = InodeId::new(self.next_id);
        self.next_id += 1;

        if let Some(parent_id) = self.parent_id(inode.path()) {
            self.children.entry(parent_id).or_default().insert(id);
        }
        if let Some(tokenizer) = tokenizer {
            self.tokenizers.insert(id, Arc::clone(tokenizer));
        }
        self.by_path.insert(inode.path().to_owned(), id);

        let record = Record::new(id, inode);
        self.by_id.insert(id, record.clone());
        record
    }

    fn detach(&mut self, id: InodeId) -> Option<Record> {
        let record = self.by_id.remove(&id)?;
        self.by_path.remove(record.path());
        self.tokenizers.remove(&id);
        self.children.remove(&id);
        if let Some(parent_id) = self.parent_id(record.path()) {
            if let Some(siblings) = self.children.get_mut(&parent_id) {
                siblings.remove(&id);
            }
        }
        Some(record)
    }

    fn parent_id(&self, path: &Utf8Path) -> Option<InodeId> {
        path.parent().and_then(|parent| self.by_path.get(parent)).copied()
    }

    /// Every id below `root`, excluding `root` itself.
    fn subtree(&self, root: InodeId) -> Vec<InodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(children) = self.children.get(&id) {
                for &child in children {
                    found.push(child);
                    stack.push(child);
                }
            }
        }
        found
    }

    fn existing_document(&self, path: &Utf8Path) -> Result<Option<Record<Document>>, IndexError> {
        let Some(record) = self.by_path.get(path).and_then(|id| self.by_id.get(id)) else {
            return Ok(None);
        };
        record
            .clone()
            .into_document()
            .map(Some)
            .ok_or_else(|| IndexError::InvalidKind {
                path: path.to_owned(),
                expected: InodeKind::Document,
                found: InodeKind::Directory,
            })
    }
}

/// The result of registering a directory.
#[derive(Debug, Clone)]
pub struct DirectoryInsert {
    /// The directory's record, new or existing.
    pub directory: Record<Directory>,

    /// Every tracked descendant, including ones registered by earlier calls.
    pub descendants: Vec<Record>,

    /// Ids inserted by this call, the directory's own included if it was new.
    pub inserted: FxHashSet<InodeId>,
}

impl DirectoryInsert {
    /// Returns the descendant documents this call inserted.
    pub fn new_documents(&self) -> impl Iterator<Item = Record<Document>> + '_ {
        self.descendants
            .iter()
            .filter(|record| self.inserted.contains(&record.id()))
            .filter_map(|record| record.clone().into_document())
    }

    /// Returns the paths of every tracked descendant.
    pub fn descendant_paths(&self) -> impl Iterator<Item = Utf8PathBuf> + '_ {
        self.descendants.iter().map(|record| record.path().to_owned())
    }
}

/// The result of removing a directory.
#[derive(Debug, Clone)]
pub struct RemovedDirectory {
    /// The removed directory.
    pub directory: Record<Directory>,

    /// Every document removed along with it.
    pub documents: Vec<Record<Document>>,

    /// Number of nested directories removed along with it.
    pub directories: usize,
}

/// Shared access to the registry, held for as long as the guard lives.
///
/// No registration or removal can happen while a guard exists, so ids
/// resolved through it can't go stale mid-query.
pub struct RegistryReadGuard<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl RegistryReadGuard<'_> {
    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: InodeId) -> Option<&Record> {
        self.state.by_id.get(&id)
    }

    /// Looks up a record by its exact (canonical) path.
    #[must_use]
    pub fn get_path(&self, path: &Utf8Path) -> Option<&Record> {
        self.state
            .by_path
            .get(path)
            .and_then(|id| self.state.by_id.get(id))
    }

    /// Looks up many records; unknown ids are skipped.
    pub fn get_all(&self, ids: impl IntoIterator<Item = InodeId>) -> Vec<&Record> {
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Resolves ids to documents, dropping unknown ids and directories.
    pub fn documents(&self, ids: impl IntoIterator<Item = InodeId>) -> FxHashSet<Document> {
        ids.into_iter()
            .filter_map(|id| match self.get(id)?.inode() {
                Inode::Document(document) => Some(document.clone()),
                Inode::Directory(_) => None,
            })
            .collect()
    }

    /// Returns the number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.by_id.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.by_id.is_empty()
    }
}

/// Tracks documents and directories and issues their ids.
///
/// # Examples
///
/// ```no_run
/// use qr_core::{Directory, Document, IndexConfig};
/// use qr_index::Registry;
///
/// # fn example() -> Result<(), qr_index::IndexError> {
/// let registry = Registry::new(IndexConfig::default());
///
/// let first = registry.add_document(Document::new("notes/todo.txt"), None)?;
/// let again = registry.add_document(Document::new("notes/todo.txt"), None)?;
/// assert_eq!(first.id(), again.id());
///
/// let insert = registry.add_directory(Directory::new("notes"), None)?;
/// assert_eq!(registry.size(), insert.descendants.len() + 1);
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    state: RwLock<RegistryState>,
    config: IndexConfig,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("size", &self.size())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl Registry {
    /// Creates an empty registry. `config` controls directory walks.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            config,
        }
    }

    /// Registers a document, or returns its existing record.
    ///
    /// The path is canonicalized first. A re-registration keeps the
    /// original id and tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the path doesn't exist, or
    /// [`IndexError::InvalidKind`] if it is a directory.
    pub fn add_document(
        &self,
        document: Document,
        tokenizer: Option<SharedTokenizer>,
    ) -> Result<Record<Document>, IndexError> {
        self.insert_document(document, tokenizer.as_ref())
            .map(|(record, _)| record)
    }

    /// Like [`add_document`](Self::add_document), also reporting whether
    /// this call inserted the record.
    pub(crate) fn insert_document(
        &self,
        document: Document,
        tokenizer: Option<&SharedTokenizer>,
    ) -> Result<(Record<Document>, bool), IndexError> {
        let path = canonical_document_path(document.path())?;

        let mut state = self.state.write();
        if let Some(existing) = state.existing_document(&path)? {
            return Ok((existing, false));
        }
        let record = state.insert_document(path, tokenizer);
        debug!(id = %record.id(), path = %record.path(), "Registered document");
        Ok((record, true))
    }

    /// Registers many documents under one write lock.
    ///
    /// Every path is validated before anything is inserted, so a missing
    /// path fails the whole batch.
    ///
    /// # Errors
    ///
    /// Same as [`add_document`](Self::add_document).
    pub fn add_all(
        &self,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<Vec<Record<Document>>, IndexError> {
        let paths = documents
            .into_iter()
            .map(|document| canonical_document_path(document.path()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.state.write();
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let record = match state.existing_document(&path)? {
                Some(existing) => existing,
                None => state.insert_document(path, None),
            };
            records.push(record);
        }
        Ok(records)
    }

    /// Registers a directory and everything currently inside it.
    ///
    /// Hidden entries are skipped, as are binary files when
    /// [`IndexConfig::skip_binary`] is set. Entries that are already
    /// tracked keep their ids and tokenizers but are linked into the
    /// hierarchy. `tokenizer` only applies if the directory itself is new;
    /// new descendants inherit through [`tokenizer_for`](Self::tokenizer_for).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the path doesn't exist, or
    /// [`IndexError::InvalidKind`] if it is a file or is tracked as one.
    pub fn add_directory(
        &self,
        directory: Directory,
        tokenizer: Option<SharedTokenizer>,
    ) -> Result<DirectoryInsert, IndexError> {
        let path = canonicalize(directory.path())?;
        let entries = DirectoryWalker::from_config(&path, &self.config)?.collect_entries();

        let mut state = self.state.write();
        let mut inserted = FxHashSet::default();

        let existing = state
            .by_path
            .get(&path)
            .and_then(|id| state.by_id.get(id))
            .cloned();
        let root = match existing {
            Some(existing) => existing,
            None => {
                let record = state.insert(Directory::new(path.clone()).into(), tokenizer.as_ref());
                inserted.insert(record.id());
                record
            }
        };
        let Some(root) = root.into_directory() else {
            return Err(IndexError::InvalidKind {
                path,
                expected: InodeKind::Directory,
                found: InodeKind::Document,
            });
        };

        for entry in entries {
            match state.by_path.get(&entry.path).copied() {
                Some(id) => {
                    if let Some(parent_id) = state.parent_id(&entry.path) {
                        state.children.entry(parent_id).or_default().insert(id);
                    }
                }
                None => {
                    let inode = match entry.kind {
                        InodeKind::Document => Inode::from(Document::new(entry.path)),
                        InodeKind::Directory => Inode::from(Directory::new(entry.path)),
                    };
                    inserted.insert(state.insert(inode, None).id());
                }
            }
        }

        let descendants: Vec<Record> = state
            .subtree(root.id())
            .into_iter()
            .filter_map(|id| state.by_id.get(&id).cloned())
            .collect();

        debug!(
            id = %root.id(),
            path = %root.path(),
            descendants = descendants.len(),
            inserted = inserted.len(),
            "Registered directory"
        );

        Ok(DirectoryInsert {
            directory: root,
            descendants,
            inserted,
        })
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: InodeId) -> Option<Record> {
        self.state.read().by_id.get(&id).cloned()
    }

    /// Looks up a record by its exact (canonical) path.
    #[must_use]
    pub fn get_path(&self, path: &Utf8Path) -> Option<Record> {
        self.read().get_path(path).cloned()
    }

    /// Looks up many records under one read lock; unknown ids are skipped.
    pub fn get_all(&self, ids: impl IntoIterator<Item = InodeId>) -> Vec<Record> {
        self.read().get_all(ids).into_iter().cloned().collect()
    }

    /// Takes the read lock and returns it as a guard.
    #[must_use]
    pub fn read(&self) -> RegistryReadGuard<'_> {
        RegistryReadGuard {
            state: self.state.read(),
        }
    }

    /// Removes a document, returning it if it was tracked.
    pub fn remove_document(&self, record: &Record<Document>) -> Option<Document> {
        let mut state = self.state.write();
        if !state
            .by_id
            .get(&record.id())
            .is_some_and(|stored| stored.inode().is_document())
        {
            return None;
        }
        let removed = state.detach(record.id())?.into_document()?;
        debug!(id = %record.id(), path = %removed.path(), "Removed document");
        Some(removed.into_inode())
    }

    /// Removes a directory and every descendant.
    ///
    /// Returns `None` if the directory wasn't tracked.
    pub fn remove_directory(&self, record: &Record<Directory>) -> Option<RemovedDirectory> {
        let mut state = self.state.write();
        if !state
            .by_id
            .get(&record.id())
            .is_some_and(|stored| stored.inode().is_directory())
        {
            return None;
        }

        let mut documents = Vec::new();
        let mut directories = 0;
        for id in state.subtree(record.id()) {
            let Some(removed) = state.detach(id) else {
                continue;
            };
            match removed.into_document() {
                Some(document) => documents.push(document),
                None => directories += 1,
            }
        }
        let directory = state.detach(record.id())?.into_directory()?;

        debug!(
            id = %directory.id(),
            path = %directory.path(),
            documents = documents.len(),
            directories,
            "Removed directory"
        );
        Some(RemovedDirectory {
            directory,
            documents,
            directories,
        })
    }

    /// Returns the immediate children of a directory, sorted by id.
    #[must_use]
    pub fn children(&self, id: InodeId) -> Vec<InodeId> {
        let state = self.state.read();
        let mut children: Vec<InodeId> = state
            .children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        children.sort_unstable();
        children
    }

    /// Resolves the tokenizer for a record.
    ///
    /// The record's own tokenizer wins; otherwise the nearest tracked
    /// ancestor directory's. `None` means the caller's default applies.
    #[must_use]
    pub fn tokenizer_for<T>(&self, record: &Record<T>) -> Option<SharedTokenizer> {
        let state = self.state.read();
        if let Some(tokenizer) = state.tokenizers.get(&record.id()) {
            return Some(Arc::clone(tokenizer));
        }
        let path = state.by_id.get(&record.id())?.path();
        path.ancestors()
            .skip(1)
            .filter_map(|ancestor| state.by_path.get(ancestor))
            .find_map(|id| state.tokenizers.get(id))
            .map(Arc::clone)
    }

    /// Returns the number of tracked records.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.read().by_id.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().by_id.is_empty()
    }
}

fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf, IndexError> {
    path.canonicalize_utf8().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            IndexError::not_found(path)
        } else {
            IndexError::io(path, source)
        }
    })
}

fn canonical_document_path(path: &Utf8Path) -> Result<Utf8PathBuf, IndexError> {
    let canonical = canonicalize(path)?;
    if canonical.is_dir() {
        return Err(IndexError::InvalidKind {
            path: canonical,
            expected: InodeKind::Document,
            found: InodeKind::Directory,
        });
    }
    Ok(canonical)
}
