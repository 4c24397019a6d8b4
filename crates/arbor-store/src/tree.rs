//! Mutable, lazily loaded tree nodes.
//!
//! A [`TreeNode`] is a directory listing held in memory. Its children are
//! either live objects ([`TreeEntry::Inline`]) or [`Reference`]s to stored
//! objects that have not been loaded ([`TreeEntry::Lazy`]).
//!
//! # Identity
//!
//! A tree's id is derived from its canonical encoding, and that encoding
//! embeds the ids of its children. Mutating a node sets its own dirty flag
//! only; whether an ancestor must be re-saved is computed on demand by
//! [`TreeNode::modified`], which never loads an unresolved reference.
//!
//! # Wire format
//!
//! One record per child, in canonical order, with no separators:
//!
//! ```text
//! <mode, ASCII octal> 0x20 <name bytes> 0x00 <20-byte raw id>
//! ```
//!
//! Canonical order compares names bytewise as if every tree name ended in
//! `/` and every other name in `\0`, so `foo` (blob) sorts before `foo.c`
//! and `foobar` (tree), while `foo` (tree) sorts after `foo.c`.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::debug;

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, EntryMode, Object, ObjectKind, StoredObject};
use crate::path::TreePath;
use crate::reference::Reference;
use crate::traits::ObjectStore;

/// A child of a tree.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeEntry {
    /// A live object held in memory.
    Inline(Object),
    /// A stored object known by mode and id, loaded on demand.
    Lazy(Reference),
}

impl TreeEntry {
    /// The kind of object this entry holds or points at.
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            Self::Inline(obj) => Some(obj.kind()),
            Self::Lazy(reference) => reference.kind(),
        }
    }

    pub fn is_tree(&self) -> bool {
        self.kind() == Some(ObjectKind::Tree)
    }

    /// The mode recorded for this entry in its parent's encoding.
    pub fn mode(&self) -> EntryMode {
        match self {
            Self::Inline(obj) => obj.mode(),
            Self::Lazy(reference) => reference.mode(),
        }
    }

    /// The last known id. `None` for an inline object never saved.
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Self::Inline(obj) => obj.id(),
            Self::Lazy(reference) => Some(reference.id()),
        }
    }

    pub fn modified(&self) -> bool {
        match self {
            Self::Inline(obj) => obj.modified(),
            Self::Lazy(reference) => reference.modified(),
        }
    }

    /// Save the entry if it holds a live object and return its id.
    pub fn save(&mut self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        match self {
            Self::Inline(obj) => obj.save(store),
            Self::Lazy(reference) => reference.save(store),
        }
    }

    /// The live object, whether inline or behind a resolved reference.
    pub fn object(&self) -> Option<&Object> {
        match self {
            Self::Inline(obj) => Some(obj),
            Self::Lazy(reference) => reference.object(),
        }
    }

    pub fn object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Self::Inline(obj) => Some(obj),
            Self::Lazy(reference) => reference.object_mut(),
        }
    }

    pub fn as_tree(&self) -> Option<&TreeNode> {
        self.object().and_then(Object::as_tree)
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut TreeNode> {
        self.object_mut().and_then(Object::as_tree_mut)
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        self.object().and_then(Object::as_blob)
    }

    pub fn as_blob_mut(&mut self) -> Option<&mut Blob> {
        self.object_mut().and_then(Object::as_blob_mut)
    }
}

impl From<Object> for TreeEntry {
    fn from(obj: Object) -> Self {
        Self::Inline(obj)
    }
}

impl From<TreeNode> for TreeEntry {
    fn from(tree: TreeNode) -> Self {
        Self::Inline(Object::Tree(tree))
    }
}

impl From<Blob> for TreeEntry {
    fn from(blob: Blob) -> Self {
        Self::Inline(Object::Blob(blob))
    }
}

impl From<Reference> for TreeEntry {
    fn from(reference: Reference) -> Self {
        Self::Lazy(reference)
    }
}

/// Result of [`TreeNode::lookup`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<'a> {
    /// The empty path: the tree that was searched.
    Tree(&'a TreeNode),
    /// A descendant entry.
    Entry(&'a TreeEntry),
}

impl<'a> Lookup<'a> {
    pub fn as_entry(&self) -> Option<&'a TreeEntry> {
        match *self {
            Self::Entry(entry) => Some(entry),
            Self::Tree(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&'a TreeNode> {
        match *self {
            Self::Tree(tree) => Some(tree),
            Self::Entry(entry) => entry.as_tree(),
        }
    }
}

/// Result of [`TreeNode::resolve`].
#[derive(Debug)]
pub enum LookupMut<'a> {
    /// The empty path: the tree that was searched.
    Tree(&'a mut TreeNode),
    /// A descendant entry, loaded if it was an unresolved blob or tree.
    Entry(&'a mut TreeEntry),
}

impl<'a> LookupMut<'a> {
    pub fn into_entry(self) -> Option<&'a mut TreeEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            Self::Tree(_) => None,
        }
    }

    pub fn into_tree(self) -> Option<&'a mut TreeNode> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Entry(entry) => entry.as_tree_mut(),
        }
    }
}

/// Iterator over `(name, entry)` pairs in canonical order.
pub type Iter<'a> = std::vec::IntoIter<(&'a str, &'a TreeEntry)>;

/// A directory listing held in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    mode: EntryMode,
    id: Option<ObjectId>,
    dirty: bool,
    children: HashMap<String, TreeEntry>,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeNode {
    /// Create an empty, unsaved tree with the directory mode.
    pub fn new() -> Self {
        Self {
            mode: EntryMode::DIRECTORY,
            id: None,
            dirty: true,
            children: HashMap::new(),
        }
    }

    /// Set the mode this tree is recorded with in its parent. The mode
    /// must denote a tree.
    pub fn with_mode(mut self, mode: EntryMode) -> StoreResult<Self> {
        if !mode.is_tree() {
            return Err(StoreError::InvalidArgument(format!(
                "mode {mode} does not denote a tree"
            )));
        }
        self.mode = mode;
        Ok(self)
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// The id this tree was last saved or loaded under.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// Record that the current content is stored under `id`. Clears the
    /// local dirty flag; children keep their own state.
    pub fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
        self.dirty = false;
    }

    /// Whether this node's own children map changed since it was saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of direct children.
    #[doc(alias = "size")]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[doc(alias = "empty")]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TreeEntry> {
        self.children.get_mut(name)
    }

    /// Whether this tree must be saved to get a valid id.
    ///
    /// True if this node is dirty or any live descendant is modified.
    /// Unresolved references count as unmodified and are never loaded here.
    pub fn modified(&self) -> bool {
        self.dirty || self.children.values().any(TreeEntry::modified)
    }

    // ---------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------

    /// `(name, entry)` pairs in canonical order.
    pub fn iter(&self) -> Iter<'_> {
        let mut entries: Vec<(&str, &TreeEntry)> = self
            .children
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        entries.sort_by(|a, b| canonical_cmp(a.0, a.1, b.0, b.1));
        entries.into_iter()
    }

    /// Child names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, _)| name)
    }

    /// Child entries in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.iter().map(|(_, entry)| entry)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Save this tree and every modified descendant, children first.
    ///
    /// Does nothing and returns the current id when nothing changed.
    pub fn save(&mut self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        if let (false, Some(id)) = (self.modified(), self.id) {
            return Ok(id);
        }
        let data = self.dump(store)?;
        let id = store.write(&StoredObject::new(ObjectKind::Tree, data))?;
        self.set_id(id);
        debug!(tree = %id.short_hex(), entries = self.children.len(), "saved tree");
        Ok(id)
    }

    /// Produce the canonical encoding.
    ///
    /// Live children (inline or resolved) are saved first so their ids are
    /// current; unresolved references contribute the id they already carry.
    pub fn dump(&mut self, store: &dyn ObjectStore) -> StoreResult<Vec<u8>> {
        let mut entries: Vec<(&String, &mut TreeEntry)> = self.children.iter_mut().collect();
        entries.sort_by(|a, b| canonical_cmp(a.0, &*a.1, b.0, &*b.1));

        let mut out = Vec::new();
        for (name, entry) in entries {
            let id = entry.save(store)?;
            out.extend_from_slice(entry.mode().to_string().as_bytes());
            out.push(b' ');
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.extend_from_slice(id.as_bytes());
        }
        Ok(out)
    }

    /// Decode one serialized tree. Every child becomes an unresolved
    /// reference; names pass through the store's name normalization.
    ///
    /// The result is clean but has no id: the caller knows which id it read.
    pub fn parse(data: &[u8], store: &dyn ObjectStore) -> StoreResult<Self> {
        let mut children = HashMap::new();
        let mut pos = 0;
        while pos < data.len() {
            let record = pos;

            let space = find(data, pos, b' ')
                .ok_or_else(|| malformed(pos, "missing space after mode"))?;
            let mode = EntryMode::from_octal(&data[pos..space])
                .ok_or_else(|| malformed(pos, "mode is not an octal number"))?;
            pos = space + 1;

            let nul = find(data, pos, 0).ok_or_else(|| malformed(pos, "missing NUL after name"))?;
            let name = store.normalize_name(&data[pos..nul])?;
            check_name(&name)
                .map_err(|_| malformed(pos, format!("unusable entry name {name:?}")))?;
            pos = nul + 1;

            let raw = data
                .get(pos..pos + ObjectId::LEN)
                .ok_or_else(|| malformed(pos, "truncated object id"))?;
            let id = ObjectId::from_raw(raw)?;
            pos += ObjectId::LEN;

            match children.entry(name) {
                Entry::Occupied(occupied) => {
                    return Err(malformed(
                        record,
                        format!("duplicate entry {:?}", occupied.key()),
                    ))
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(TreeEntry::Lazy(Reference::new(mode, id)));
                }
            }
        }
        debug!(entries = children.len(), bytes = data.len(), "parsed tree");
        Ok(Self {
            mode: EntryMode::DIRECTORY,
            id: None,
            dirty: false,
            children,
        })
    }

    /// Read and decode the tree stored under `id`.
    pub fn load(store: &dyn ObjectStore, id: &ObjectId) -> StoreResult<Self> {
        let stored = store.read(id)?.ok_or(StoreError::NotFound(*id))?;
        if stored.kind != ObjectKind::Tree {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("expected tree, got {}", stored.kind),
            });
        }
        let mut tree = Self::parse(&stored.data, store)?;
        tree.set_id(*id);
        Ok(tree)
    }

    // ---------------------------------------------------------------
    // Path operations
    // ---------------------------------------------------------------

    /// Find the entry at `path`. The empty path yields this tree.
    ///
    /// Unresolved subtrees along the way are loaded from `store`; the final
    /// entry is returned as it is. Returns `Ok(None)` when any segment is
    /// absent, and [`StoreError::NotATree`] when an intermediate entry is
    /// not a tree.
    pub fn lookup(
        &mut self,
        path: impl Into<TreePath>,
        store: &dyn ObjectStore,
    ) -> StoreResult<Option<Lookup<'_>>> {
        let path = path.into();
        let Some((name, dirs)) = path.segments().split_last() else {
            return Ok(Some(Lookup::Tree(self)));
        };
        Ok(self
            .parent_mut(dirs, store)?
            .and_then(|parent| parent.children.get(name))
            .map(Lookup::Entry))
    }

    pub fn exists(&mut self, path: impl Into<TreePath>, store: &dyn ObjectStore) -> StoreResult<bool> {
        Ok(self.lookup(path, store)?.is_some())
    }

    /// Attach `entry` at `path`, creating missing intermediate trees and
    /// loading unresolved ones from `store`.
    ///
    /// Every segment must be a valid entry name. Not atomic: intermediate
    /// trees created before a failure stay in place.
    pub fn set(
        &mut self,
        path: impl Into<TreePath>,
        entry: impl Into<TreeEntry>,
        store: &dyn ObjectStore,
    ) -> StoreResult<()> {
        let path = path.into();
        let entry = entry.into();
        if let TreeEntry::Lazy(reference) = &entry {
            if reference.id().is_null() {
                return Err(StoreError::InvalidArgument(
                    "reference to the null object id".into(),
                ));
            }
        }
        check_path(&path)?;
        self.set_segments(path.segments(), entry, store)
    }

    fn set_segments(
        &mut self,
        segments: &[String],
        entry: TreeEntry,
        store: &dyn ObjectStore,
    ) -> StoreResult<()> {
        match segments {
            [] => Err(StoreError::EmptyPath),
            [name] => {
                if !matches!(entry.kind(), Some(ObjectKind::Blob | ObjectKind::Tree)) {
                    return Err(StoreError::NotABlobOrTree(name.clone()));
                }
                self.children.insert(name.clone(), entry);
                self.dirty = true;
                Ok(())
            }
            [name, rest @ ..] => {
                let child = match self.children.entry(name.clone()) {
                    Entry::Occupied(occupied) => occupied.into_mut(),
                    Entry::Vacant(vacant) => {
                        self.dirty = true;
                        vacant.insert(TreeNode::new().into())
                    }
                };
                descend_mut(name, child, store)?.set_segments(rest, entry, store)
            }
        }
    }

    /// Remove and return the entry at `path`, loading unresolved subtrees
    /// along the way.
    ///
    /// Returns `Ok(None)` when any segment is absent; nothing is marked dirty
    /// in that case.
    pub fn delete(
        &mut self,
        path: impl Into<TreePath>,
        store: &dyn ObjectStore,
    ) -> StoreResult<Option<TreeEntry>> {
        let path = path.into();
        let (name, dirs) = path.segments().split_last().ok_or(StoreError::EmptyPath)?;
        let Some(parent) = self.parent_mut(dirs, store)? else {
            return Ok(None);
        };
        let removed = parent.children.remove(name);
        if removed.is_some() {
            parent.dirty = true;
        }
        Ok(removed)
    }

    /// Move the entry at `from` to `to`: a delete followed by a set.
    ///
    /// Fails with [`StoreError::PathNotFound`] and changes nothing when
    /// `from` is absent, and with [`StoreError::EmptyPath`] or
    /// [`StoreError::InvalidName`] when `to` is unusable. If the set fails
    /// for any other reason, the entry is gone from `from`.
    pub fn move_entry(
        &mut self,
        from: impl Into<TreePath>,
        to: impl Into<TreePath>,
        store: &dyn ObjectStore,
    ) -> StoreResult<()> {
        let from = from.into();
        let to = to.into();
        check_path(&to)?;
        let entry = self
            .delete(&from, store)?
            .ok_or_else(|| StoreError::PathNotFound(from.to_string()))?;
        self.set(to, entry, store)
    }

    /// Like [`lookup`](TreeNode::lookup), but also loads the final entry
    /// and hands it out mutably. The empty path yields this tree.
    ///
    /// Only references on the path are resolved; siblings stay lazy.
    pub fn resolve(
        &mut self,
        path: impl Into<TreePath>,
        store: &dyn ObjectStore,
    ) -> StoreResult<Option<LookupMut<'_>>> {
        let path = path.into();
        let Some((name, dirs)) = path.segments().split_last() else {
            return Ok(Some(LookupMut::Tree(self)));
        };
        let Some(entry) = self
            .parent_mut(dirs, store)?
            .and_then(|parent| parent.children.get_mut(name))
        else {
            return Ok(None);
        };
        if let TreeEntry::Lazy(reference) = entry {
            if matches!(reference.kind(), Some(ObjectKind::Blob | ObjectKind::Tree)) {
                reference.resolve(store)?;
            }
        }
        Ok(Some(LookupMut::Entry(entry)))
    }

    /// Walk `dirs` down from this node, loading unresolved subtrees.
    fn parent_mut(
        &mut self,
        dirs: &[String],
        store: &dyn ObjectStore,
    ) -> StoreResult<Option<&mut TreeNode>> {
        match dirs.split_first() {
            None => Ok(Some(self)),
            Some((name, rest)) => match self.children.get_mut(name) {
                None => Ok(None),
                Some(entry) => descend_mut(name, entry, store)?.parent_mut(rest, store),
            },
        }
    }
}

impl<'a> IntoIterator for &'a TreeNode {
    type Item = (&'a str, &'a TreeEntry);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Order two children by `name + '/'` for trees and `name + '\0'` otherwise.
fn canonical_cmp(a_name: &str, a: &TreeEntry, b_name: &str, b: &TreeEntry) -> Ordering {
    sort_key(a_name, a).cmp(sort_key(b_name, b))
}

fn sort_key<'a>(name: &'a str, entry: &TreeEntry) -> impl Iterator<Item = u8> + 'a {
    let suffix = if entry.is_tree() { b'/' } else { b'\0' };
    name.bytes().chain(std::iter::once(suffix))
}

/// Step into `entry` as a subtree, loading it first if it is an unresolved
/// tree reference.
fn descend_mut<'a>(
    name: &str,
    entry: &'a mut TreeEntry,
    store: &dyn ObjectStore,
) -> StoreResult<&'a mut TreeNode> {
    if let TreeEntry::Lazy(reference) = entry {
        if !reference.resolved() && reference.mode().is_tree() {
            reference.resolve(store)?;
        }
    }
    entry
        .as_tree_mut()
        .ok_or_else(|| StoreError::NotATree(name.to_owned()))
}

/// Names are non-empty and free of `/` and NUL, so each one survives the
/// record format and can be reached by a string path.
fn check_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains(['/', '\0']) {
        return Err(StoreError::InvalidName(name.to_owned()));
    }
    Ok(())
}

fn check_path(path: &TreePath) -> StoreResult<()> {
    if path.is_empty() {
        return Err(StoreError::EmptyPath);
    }
    path.segments().iter().try_for_each(|name| check_name(name))
}

fn find(data: &[u8], from: usize, byte: u8) -> Option<usize> {
    data[from..].iter().position(|&b| b == byte).map(|i| from + i)
}

fn malformed(offset: usize, reason: impl Into<String>) -> StoreError {
    StoreError::MalformedTree {
        offset,
        reason: reason.into(),
    }
}
