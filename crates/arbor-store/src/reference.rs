//! Lazy handles to stored objects.

use tracing::debug;

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, EntryMode, Object, ObjectKind};
use crate::traits::ObjectStore;
use crate::tree::TreeNode;

/// A child known only by mode and id until it is resolved.
///
/// An unresolved reference is never modified: its id is by construction the
/// id of what it points at. Once resolved, the live object may change, and
/// [`save`](Reference::save) refreshes the id from it.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    mode: EntryMode,
    id: ObjectId,
    object: Option<Box<Object>>,
}

impl Reference {
    pub fn new(mode: EntryMode, id: ObjectId) -> Self {
        Self {
            mode,
            id,
            object: None,
        }
    }

    /// Build a reference from the 40-character hex form of an id.
    pub fn from_hex(mode: EntryMode, hex: &str) -> StoreResult<Self> {
        Ok(Self::new(mode, ObjectId::from_hex(hex)?))
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// The last id known for the target. For a resolved reference this is
    /// stale until the next [`save`](Reference::save) if the object changed.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn resolved(&self) -> bool {
        self.object.is_some()
    }

    /// Whether the resolved object changed. Always `false` when unresolved.
    pub fn modified(&self) -> bool {
        self.object.as_ref().is_some_and(|obj| obj.modified())
    }

    /// Kind of the target: the live object's kind once resolved, otherwise
    /// the kind the mode denotes.
    pub fn kind(&self) -> Option<ObjectKind> {
        match &self.object {
            Some(obj) => Some(obj.kind()),
            None => self.mode.kind(),
        }
    }

    pub fn object(&self) -> Option<&Object> {
        self.object.as_deref()
    }

    pub fn object_mut(&mut self) -> Option<&mut Object> {
        self.object.as_deref_mut()
    }

    /// Load the target from `store`, if not loaded already.
    ///
    /// Trees come back with all of their own children unresolved.
    pub fn resolve(&mut self, store: &dyn ObjectStore) -> StoreResult<&mut Object> {
        let object = match self.object.take() {
            Some(object) => object,
            None => Box::new(self.load(store)?),
        };
        Ok(&mut **self.object.insert(object))
    }

    /// Save the resolved object, if any, and return the up-to-date id.
    pub fn save(&mut self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        if let Some(object) = self.object.as_deref_mut() {
            self.id = object.save(store)?;
        }
        Ok(self.id)
    }

    fn load(&self, store: &dyn ObjectStore) -> StoreResult<Object> {
        let kind = match self.mode.kind() {
            Some(kind @ (ObjectKind::Blob | ObjectKind::Tree)) => kind,
            _ => {
                return Err(StoreError::NotABlobOrTree(format!(
                    "{} has mode {}",
                    self.id, self.mode
                )))
            }
        };
        let stored = store.read(&self.id)?.ok_or(StoreError::NotFound(self.id))?;
        if stored.kind != kind {
            return Err(StoreError::CorruptObject {
                id: self.id,
                reason: format!("mode {} points at a {}", self.mode, stored.kind),
            });
        }
        let object = match kind {
            ObjectKind::Tree => {
                let mut tree = TreeNode::parse(&stored.data, store)?.with_mode(self.mode)?;
                tree.set_id(self.id);
                Object::Tree(tree)
            }
            _ => {
                let mut blob = Blob::from_stored_object(&stored)?.with_mode(self.mode)?;
                blob.set_id(self.id);
                Object::Blob(blob)
            }
        };
        debug!(object = %self.id.short_hex(), kind = %object.kind(), "resolved reference");
        Ok(object)
    }
}
