//! Kind groups: the unit of work the scheduler times and demotes.

use crate::entity::{EntityKey, EntityRef, KindTag};

/// An ordered batch of entity references that share one [`KindTag`].
///
/// Order within a group carries no meaning beyond "where the next pass
/// resumes": entries are swap-removed, rotated, and split freely.
#[derive(Debug, Clone)]
pub struct KindGroup {
    kind: KindTag,
    entries: Vec<EntityRef>,
}

impl KindGroup {
    /// An empty group for `kind`.
    pub fn new(kind: KindTag) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> KindTag {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntityRef> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityRef> {
        self.entries.iter()
    }

    /// Whether an entry refers to the entity identified by `key`.
    pub fn contains(&self, key: EntityKey) -> bool {
        self.entries.iter().any(|e| e.key() == key)
    }

    /// Append `entity` to the back. A reference that is already invalid is
    /// dropped and `false` is returned.
    pub fn append(&mut self, entity: EntityRef) -> bool {
        if !entity.is_valid() {
            return false;
        }
        self.entries.push(entity);
        true
    }

    /// Move every entry of `other` to the back of this group, as-is.
    ///
    /// Unlike [`append`](Self::append) this keeps invalid references: it is a
    /// migration between levels, and invalid entries are purged (with their
    /// membership records) when their new group is next visited.
    pub fn append_many(&mut self, mut other: KindGroup) {
        debug_assert_eq!(self.kind, other.kind, "merging groups of different kinds");
        if self.entries.is_empty() {
            std::mem::swap(&mut self.entries, &mut other.entries);
        } else {
            self.entries.append(&mut other.entries);
        }
    }

    /// Remove the first entry for `key`. Returns whether one was found.
    pub fn remove_by_identity(&mut self, key: EntityKey) -> bool {
        match self.entries.iter().position(|e| e.key() == key) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index`, filling the hole with the last entry.
    pub fn swap_remove(&mut self, index: usize) -> EntityRef {
        self.entries.swap_remove(index)
    }

    /// Keep only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, keep: impl FnMut(&EntityRef) -> bool) {
        self.entries.retain(keep);
    }

    /// Rotate so the entry currently at `index` becomes the front.
    pub fn rotate_to(&mut self, index: usize) {
        if index < self.entries.len() {
            self.entries.rotate_left(index);
        }
    }

    /// Split off entries `index..` into a new group of the same kind. The
    /// prefix stays in place.
    pub fn take_suffix_from(&mut self, index: usize) -> KindGroup {
        let index = index.min(self.entries.len());
        KindGroup {
            kind: self.kind,
            entries: self.entries.split_off(index),
        }
    }
}

impl<'a> IntoIterator for &'a KindGroup {
    type Item = &'a EntityRef;
    type IntoIter = std::slice::Iter<'a, EntityRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
