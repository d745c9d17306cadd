//! Registry-issued records.

use camino::Utf8Path;
use qr_core::{Directory, Document, Inode, InodeId, InodeKind};

/// An inode paired with the id the registry assigned to it.
///
/// Only the registry creates records, so holding one means the id was
/// issued for exactly this inode. Ids are never reused, even after removal.
///
/// The type parameter narrows the inode: `Record<Inode>` is what the
/// registry stores, `Record<Document>` and `Record<Directory>` are what
/// kind-specific operations hand out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record<T = Inode> {
    id: InodeId,
    inode: T,
}

impl<T> Record<T> {
    pub(crate) const fn new(id: InodeId, inode: T) -> Self {
        Self { id, inode }
    }

    /// Returns the registry-assigned id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> InodeId {
        self.id
    }

    /// Returns the inode.
    #[inline]
    #[must_use]
    pub const fn inode(&self) -> &T {
        &self.inode
    }

    /// Consumes the record, returning the inode.
    #[inline]
    #[must_use]
    pub fn into_inode(self) -> T {
        self.inode
    }
}

impl Record<Inode> {
    /// Returns the tracked path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.inode.path()
    }

    /// Returns the inode kind.
    #[must_use]
    pub const fn kind(&self) -> InodeKind {
        self.inode.kind()
    }

    /// Narrows to a document record.
    #[must_use]
    pub fn into_document(self) -> Option<Record<Document>> {
        match self.inode {
            Inode::Document(document) => Some(Record::new(self.id, document)),
            Inode::Directory(_) => None,
        }
    }

    /// Narrows to a directory record.
    #[must_use]
    pub fn into_directory(self) -> Option<Record<Directory>> {
        match self.inode {
            Inode::Directory(directory) => Some(Record::new(self.id, directory)),
            Inode::Document(_) => None,
        }
    }
}

impl Record<Document> {
    /// Returns the document's path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.inode.path()
    }
}

impl Record<Directory> {
    /// Returns the directory's path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.inode.path()
    }
}

impl From<Record<Document>> for Record<Inode> {
    fn from(record: Record<Document>) -> Self {
        Self::new(record.id, Inode::Document(record.inode))
    }
}

impl From<Record<Directory>> for Record<Inode> {
    fn from(record: Record<Directory>) -> Self {
        Self::new(record.id, Inode::Directory(record.inode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrowing() {
        let record = Record::new(InodeId::new(3), Inode::from(Document::new("/a.txt")));
        assert_eq!(record.kind(), InodeKind::Document);
        assert!(record.clone().into_directory().is_none());

        let document = record.into_document().unwrap();
        assert_eq!(document.id(), InodeId::new(3));
        assert_eq!(document.path().as_str(), "/a.txt");
    }

    #[test]
    fn test_widening_keeps_id() {
        let directory = Record::new(InodeId::new(7), Directory::new("/notes"));
        let record: Record = directory.into();
        assert_eq!(record.id(), InodeId::new(7));
        assert_eq!(record.path().as_str(), "/notes");
        assert!(record.inode().is_directory());
    }
}
