use arbor_types::{ObjectId, TypeError};

/// Errors from object store and tree operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: expected {expected}, computed {computed}")]
    HashMismatch {
        id: ObjectId,
        expected: String,
        computed: String,
    },

    /// The object data is of the wrong kind or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Serialized tree bytes do not follow the record format.
    #[error("malformed tree at byte {offset}: {reason}")]
    MalformedTree { offset: usize, reason: String },

    /// An entry name is empty, contains `/` or NUL, or was rejected by the
    /// store's name encoding.
    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    /// A hex or raw object id could not be decoded.
    #[error("invalid object id: {0}")]
    InvalidId(#[from] TypeError),

    /// Attempted to write an object that hashes to the null ID.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// The value passed as a tree entry cannot be stored.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A path with no segments was given where a child name is required.
    #[error("empty path")]
    EmptyPath,

    /// Path traversal reached an entry that is not a tree.
    #[error("not a tree: {0}")]
    NotATree(String),

    /// The entry to attach is neither a blob nor a tree.
    #[error("not a blob or tree: {0}")]
    NotABlobOrTree(String),

    /// Nothing exists at the given path.
    #[error("path not found: {0}")]
    PathNotFound(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
