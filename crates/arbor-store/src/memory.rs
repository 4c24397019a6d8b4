use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{trace, warn};

use arbor_types::ObjectId;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects live behind a `RwLock` and are
/// cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
    config: StoreConfig,
}

impl InMemoryObjectStore {
    /// Create a new empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a new empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        let Some(obj) = map.get(id) else {
            return Ok(None);
        };
        if self.config.verify_on_read && !obj.kind.hasher().verify(&obj.data, id) {
            let computed = obj.compute_id();
            warn!(object = %id.short_hex(), computed = %computed.short_hex(), "stored object failed verification");
            return Err(StoreError::HashMismatch {
                id: *id,
                expected: id.to_hex(),
                computed: computed.to_hex(),
            });
        }
        Ok(Some(obj.clone()))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        let deduplicated = map.contains_key(&id);
        // Same ID always maps to the same content, so an existing entry wins.
        map.entry(id).or_insert_with(|| object.clone());
        trace!(object = %id.short_hex(), kind = %object.kind, size = object.size, deduplicated, "wrote object");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn normalize_name(&self, raw: &[u8]) -> StoreResult<String> {
        self.config.name_encoding.decode(raw)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use crate::tree::TreeNode;

    fn make_blob(content: &[u8]) -> StoredObject {
        Blob::new(content.to_vec()).to_stored_object()
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_blob() {
        let store = InMemoryObjectStore::new();
        let obj = make_blob(b"hello world");
        let id = store.write(&obj).unwrap();
        assert!(!id.is_null());

        let read_back = store.read(&id).unwrap().expect("should exist");
        assert_eq!(read_back, obj);
    }

    #[test]
    fn write_and_load_tree() {
        let store = InMemoryObjectStore::new();
        let mut tree = TreeNode::new();
        tree.set("hello.txt", Blob::new("hello"), &store).unwrap();
        tree.set("subdir/inner.txt", Blob::new("inner"), &store).unwrap();
        let id = tree.save(&store).unwrap();

        let read_back = store.read(&id).unwrap().expect("should exist");
        assert_eq!(read_back.kind, ObjectKind::Tree);

        let loaded = TreeNode::load(&store, &id).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.get("hello.txt").is_some());
        assert_eq!(loaded.id(), Some(id));
    }

    // -----------------------------------------------------------------------
    // Content-addressing correctness
    // -----------------------------------------------------------------------

    #[test]
    fn same_content_produces_same_id() {
        let store = InMemoryObjectStore::new();
        let id1 = store.write(&make_blob(b"identical content")).unwrap();
        let id2 = store.write(&make_blob(b"identical content")).unwrap();
        assert_eq!(id1, id2);
        // Only one object stored (dedup)
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_content_produces_different_ids() {
        let store = InMemoryObjectStore::new();
        let id1 = store.write(&make_blob(b"aaa")).unwrap();
        let id2 = store.write(&make_blob(b"bbb")).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(store.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Exists / Delete
    // -----------------------------------------------------------------------

    #[test]
    fn exists_for_missing_object() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"nonexistent");
        assert!(!store.exists(&id).unwrap());
    }

    #[test]
    fn delete_present_object() {
        let store = InMemoryObjectStore::new();
        let id = store.write(&make_blob(b"to-delete")).unwrap();
        assert!(store.exists(&id).unwrap());
        assert!(store.delete(&id).unwrap()); // was present
        assert!(!store.exists(&id).unwrap()); // now gone
        assert!(!store.delete(&id).unwrap()); // second delete = false
    }

    #[test]
    fn read_missing_object_returns_none() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"missing");
        assert!(store.read(&id).unwrap().is_none());
    }

    // -----------------------------------------------------------------------
    // Batch operations
    // -----------------------------------------------------------------------

    #[test]
    fn write_batch_and_read_batch() {
        let store = InMemoryObjectStore::new();
        let objects = vec![
            make_blob(b"batch-1"),
            make_blob(b"batch-2"),
            make_blob(b"batch-3"),
        ];
        let ids = store.write_batch(&objects).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.len(), 3);

        let read_back = store.read_batch(&ids).unwrap();
        for (i, maybe_obj) in read_back.into_iter().enumerate() {
            let obj = maybe_obj.expect("batch object should exist");
            assert_eq!(obj, objects[i]);
        }
    }

    #[test]
    fn read_batch_with_missing() {
        let store = InMemoryObjectStore::new();
        let id1 = store.write(&make_blob(b"exists")).unwrap();
        let id2 = ObjectId::from_bytes(b"missing");

        let results = store.read_batch(&[id1, id2]).unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    #[test]
    fn len_counts_distinct_objects() {
        let store = InMemoryObjectStore::new();
        assert!(store.is_empty());
        for data in [&b"aaa"[..], b"bbb", b"aaa"] {
            store.write(&make_blob(data)).unwrap();
        }
        assert_eq!(store.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn verify_on_read_detects_tampering() {
        let store = InMemoryObjectStore::with_config(StoreConfig::paranoid());
        let id = store.write(&make_blob(b"original")).unwrap();
        assert!(store.read(&id).unwrap().is_some());

        store
            .objects
            .write()
            .unwrap()
            .insert(id, make_blob(b"tampered"));
        let err = store.read(&id).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
    }

    #[test]
    fn tampering_goes_unnoticed_without_verification() {
        let store = InMemoryObjectStore::new();
        let id = store.write(&make_blob(b"original")).unwrap();
        store
            .objects
            .write()
            .unwrap()
            .insert(id, make_blob(b"tampered"));
        assert_eq!(store.read(&id).unwrap().unwrap().data, b"tampered");
    }

    #[test]
    fn normalize_name_follows_config() {
        let strict = InMemoryObjectStore::new();
        assert!(strict.normalize_name(b"\xff").is_err());

        let lenient = InMemoryObjectStore::with_config(StoreConfig::lenient());
        assert_eq!(lenient.normalize_name(b"\xff").unwrap(), "\u{fffd}");
    }

    // -----------------------------------------------------------------------
    // Debug
    // -----------------------------------------------------------------------

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        store.write(&make_blob(b"x")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
