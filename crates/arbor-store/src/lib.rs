//! Content-addressed object storage and tree nodes for arbor.
//!
//! Every object is stored under the hash of its bytes, domain-separated by
//! object kind. Trees are the interesting part: a [`TreeNode`] is a mutable
//! directory listing whose children are either live objects or lazy
//! [`Reference`]s, and whose canonical encoding embeds the ids of its
//! children, so saving a tree saves its changed descendants first.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw content
//! - [`TreeNode`] -- directory listing, path-addressable, lazily loaded
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Children are saved before the tree that embeds their ids.
//! 3. Checking whether a tree changed never loads anything from the store.
//! 4. The store owns the name-normalization policy; trees embed none.
//! 5. A tree graph has one owner; mutation needs `&mut`.

pub mod config;
pub mod error;
pub mod memory;
pub mod object;
pub mod path;
pub mod reference;
pub mod traits;
pub mod tree;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{NameEncoding, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, EntryMode, Object, ObjectKind, StoredObject};
pub use path::TreePath;
pub use reference::Reference;
pub use traits::ObjectStore;
pub use tree::{Lookup, LookupMut, TreeEntry, TreeNode};
