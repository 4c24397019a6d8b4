use serde::{Deserialize, Serialize};
use arbor_crypto::ContentHasher;
use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;
use crate::tree::TreeNode;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content (file contents, arbitrary data).
    Blob,
    /// Directory listing: entries mapping names to object references.
    Tree,
    /// Commit. Only ever referenced from a tree (gitlink), never built here.
    Commit,
}

impl ObjectKind {
    /// The domain-separated hasher that derives ids for this kind.
    pub fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Blob => &ContentHasher::BLOB,
            Self::Tree => &ContentHasher::TREE,
            Self::Commit => &ContentHasher::COMMIT,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
///
/// `StoredObject` is the unit of storage. The store never interprets the
/// contents of the data; it is a pure key-value store keyed by content hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The serialized bytes of the object.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }
}

// ---------------------------------------------------------------------------
// EntryMode
// ---------------------------------------------------------------------------

/// File mode of a tree entry.
///
/// Kept as the raw integer so decoded trees re-encode byte-exactly even when
/// they carry modes this crate has no name for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryMode(u32);

impl EntryMode {
    /// Subtree / directory.
    pub const DIRECTORY: Self = Self(0o040000);
    /// Normal file.
    pub const REGULAR: Self = Self(0o100644);
    /// Executable file.
    pub const EXECUTABLE: Self = Self(0o100755);
    /// Symbolic link.
    pub const SYMLINK: Self = Self(0o120000);
    /// Reference to a commit in another repository.
    pub const GITLINK: Self = Self(0o160000);

    const TYPE_MASK: u32 = 0o170000;

    /// Wrap raw mode bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw mode bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Parse the ASCII octal digits used on the wire.
    ///
    /// Returns `None` for an empty field, a non-octal digit, or overflow.
    pub fn from_octal(digits: &[u8]) -> Option<Self> {
        if digits.is_empty() {
            return None;
        }
        digits
            .iter()
            .try_fold(0u32, |acc, &d| match d {
                b'0'..=b'7' => acc.checked_mul(8)?.checked_add(u32::from(d - b'0')),
                _ => None,
            })
            .map(Self)
    }

    /// The kind of object an entry with this mode points at.
    pub fn kind(&self) -> Option<ObjectKind> {
        match self.0 & Self::TYPE_MASK {
            0o040000 => Some(ObjectKind::Tree),
            0o160000 => Some(ObjectKind::Commit),
            0o100000 | 0o120000 => Some(ObjectKind::Blob),
            _ => None,
        }
    }

    /// Returns `true` if this mode denotes a subtree.
    pub fn is_tree(&self) -> bool {
        self.kind() == Some(ObjectKind::Tree)
    }
}

impl Default for EntryMode {
    fn default() -> Self {
        Self::DIRECTORY
    }
}

/// Octal without leading zeros, as written on the wire (`40000`, `100644`).
impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

impl std::fmt::Debug for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntryMode({:06o})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw content object (analogous to git blob).
///
/// Tracks its own id and dirtiness so it can live inline in a tree and be
/// saved together with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
    mode: EntryMode,
    id: Option<ObjectId>,
    dirty: bool,
}

impl Blob {
    /// Create a new, unsaved blob from raw bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            mode: EntryMode::REGULAR,
            id: None,
            dirty: true,
        }
    }

    /// Set the mode this blob is recorded with in its parent tree.
    ///
    /// The mode must denote a blob (regular, executable or symlink), so the
    /// blob sorts and reloads the same way it was written.
    pub fn with_mode(mut self, mode: EntryMode) -> StoreResult<Self> {
        if mode.kind() != Some(ObjectKind::Blob) {
            return Err(StoreError::InvalidArgument(format!(
                "mode {mode} does not denote a blob"
            )));
        }
        self.mode = mode;
        Ok(self)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the content. The blob must be saved again.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
        self.dirty = true;
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// The id this blob was last saved under, if any.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// Record that the current content is stored under `id`.
    pub fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
        self.dirty = false;
    }

    pub fn modified(&self) -> bool {
        self.dirty
    }

    /// Persist the blob if it changed since the last save.
    pub fn save(&mut self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        if let (false, Some(id)) = (self.dirty, self.id) {
            return Ok(id);
        }
        let id = store.write(&self.to_stored_object())?;
        self.set_id(id);
        Ok(id)
    }

    /// Convert into a `StoredObject` for storage.
    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    /// Decode from a `StoredObject`. The result is clean but carries no id;
    /// the caller knows which id it read.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Blob {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected blob, got {}", obj.kind),
            });
        }
        Ok(Self {
            data: obj.data.clone(),
            mode: EntryMode::REGULAR,
            id: None,
            dirty: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// A live object held in memory.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Tree(TreeNode),
    Blob(Blob),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Tree(_) => ObjectKind::Tree,
            Self::Blob(_) => ObjectKind::Blob,
        }
    }

    pub fn mode(&self) -> EntryMode {
        match self {
            Self::Tree(tree) => tree.mode(),
            Self::Blob(blob) => blob.mode(),
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Self::Tree(tree) => tree.id(),
            Self::Blob(blob) => blob.id(),
        }
    }

    pub fn modified(&self) -> bool {
        match self {
            Self::Tree(tree) => tree.modified(),
            Self::Blob(blob) => blob.modified(),
        }
    }

    pub fn save(&mut self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        match self {
            Self::Tree(tree) => tree.save(store),
            Self::Blob(blob) => blob.save(store),
        }
    }

    pub fn as_tree(&self) -> Option<&TreeNode> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Blob(_) => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut TreeNode> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Blob(_) => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            Self::Tree(_) => None,
        }
    }

    pub fn as_blob_mut(&mut self) -> Option<&mut Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            Self::Tree(_) => None,
        }
    }
}

impl From<TreeNode> for Object {
    fn from(tree: TreeNode) -> Self {
        Self::Tree(tree)
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}
