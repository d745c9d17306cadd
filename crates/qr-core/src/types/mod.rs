//! Domain types for the quarry search index.
//!
//! - [`inode`](self) - Tracked filesystem entries and their identifiers
//! - [`token`](self) - Tokens, position lists, and tokenizations
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use qr_core::{Document, Inode, InodeId, Token};
//! ```

mod inode;
mod token;

pub use inode::{Directory, Document, Inode, InodeId, InodeKind};
pub use token::{Positions, Token, Tokenization};
