//! One tier of the feedback queue.

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::entity::{EntityRef, KindTag, TickCategory};
use crate::group::KindGroup;

/// All work registered at one priority tier, keyed by kind.
///
/// Primary and attached entities are kept in separate maps so a pass can
/// service every primary group before any attached group. Both maps keep
/// kinds in first-registration order, which fixes the service order of
/// kinds within a level.
#[derive(Debug, Clone, Default)]
pub struct PriorityLevel {
    primary: IndexMap<KindTag, KindGroup>,
    attached: IndexMap<KindTag, KindGroup>,
}

impl PriorityLevel {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, category: TickCategory) -> &IndexMap<KindTag, KindGroup> {
        match category {
            TickCategory::Primary => &self.primary,
            TickCategory::Attached => &self.attached,
        }
    }

    fn map_mut(&mut self, category: TickCategory) -> &mut IndexMap<KindTag, KindGroup> {
        match category {
            TickCategory::Primary => &mut self.primary,
            TickCategory::Attached => &mut self.attached,
        }
    }

    /// Get or create the group for `kind`.
    ///
    /// The returned borrow must not be held across a tick: groups are moved
    /// out and merged back by every pass.
    pub fn group_for(&mut self, category: TickCategory, kind: KindTag) -> &mut KindGroup {
        self.map_mut(category)
            .entry(kind)
            .or_insert_with(|| KindGroup::new(kind))
    }

    /// The group for `kind`, if one exists.
    pub fn group(&self, category: TickCategory, kind: KindTag) -> Option<&KindGroup> {
        self.map(category).get(&kind)
    }

    pub(crate) fn group_mut(
        &mut self,
        category: TickCategory,
        kind: KindTag,
    ) -> Option<&mut KindGroup> {
        self.map_mut(category).get_mut(&kind)
    }

    /// Number of kind groups (including empty ones) in `category`.
    pub fn group_count(&self, category: TickCategory) -> usize {
        self.map(category).len()
    }

    pub(crate) fn group_at_mut(
        &mut self,
        category: TickCategory,
        index: usize,
    ) -> Option<&mut KindGroup> {
        self.map_mut(category)
            .get_index_mut(index)
            .map(|(_, group)| group)
    }

    /// Groups in service order for `category`.
    pub fn groups(&self, category: TickCategory) -> impl Iterator<Item = &KindGroup> {
        self.map(category).values()
    }

    /// Append one reference to its kind's group. Returns `false` if the
    /// reference was already invalid.
    pub fn append(&mut self, entity: EntityRef) -> bool {
        self.group_for(entity.category(), entity.kind()).append(entity)
    }

    /// Append a whole group (e.g. a demoted suffix) to its kind's group.
    pub fn append_many(&mut self, category: TickCategory, group: KindGroup) {
        if group.is_empty() {
            return;
        }
        match self.map_mut(category).entry(group.kind()) {
            Entry::Occupied(mut existing) => existing.get_mut().append_many(group),
            Entry::Vacant(slot) => {
                slot.insert(group);
            }
        }
    }

    /// Move every group of `other` into this level.
    pub fn absorb(&mut self, other: PriorityLevel) {
        let PriorityLevel { primary, attached } = other;
        for group in primary.into_values() {
            self.append_many(TickCategory::Primary, group);
        }
        for group in attached.into_values() {
            self.append_many(TickCategory::Attached, group);
        }
    }

    /// Total number of entries across both categories.
    pub fn len(&self) -> usize {
        self.primary.values().map(KindGroup::len).sum::<usize>()
            + self.attached.values().map(KindGroup::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.values().all(KindGroup::is_empty)
            && self.attached.values().all(KindGroup::is_empty)
    }

    /// Apply `f` to every group in both categories.
    pub(crate) fn for_each_group_mut(&mut self, mut f: impl FnMut(&mut KindGroup)) {
        self.primary.values_mut().for_each(&mut f);
        self.attached.values_mut().for_each(&mut f);
    }

    /// Iterate every reference in service order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRef> {
        self.primary
            .values()
            .chain(self.attached.values())
            .flat_map(KindGroup::iter)
    }

    /// Drop empty groups so the maps do not grow without bound as kinds come
    /// and go. Order of the remaining kinds is preserved.
    pub fn prune_empty(&mut self) {
        self.primary.retain(|_, group| !group.is_empty());
        self.attached.retain(|_, group| !group.is_empty());
    }
}
