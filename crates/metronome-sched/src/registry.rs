//! Registration bookkeeping: the live queue, the membership index, and the
//! handles callers use to unregister.
//!
//! Every registered entity has exactly one [`Membership`] record, keyed by
//! its [`EntityKey`]. The record remembers the entity's kind, category, and
//! current level, so unregistering jumps straight to the right group instead
//! of scanning every level. Each registration also gets a fresh generation
//! number; a [`RegistrationHandle`] whose generation no longer matches is
//! stale.
//!
//! While a tick is in flight the queue that is being serviced has been moved
//! out of the registry. Registrations made during the pass land in the
//! (initially empty) live queue; unregistrations of entities that sit in the
//! in-flight snapshot are recorded as tombstones, which the pass honours
//! immediately and the rebuild applies afterwards.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use crate::entity::{EntityKey, EntityRef, KindTag, TickCategory};
use crate::queue::FeedbackQueue;
use crate::SchedulerError;

// ---------------------------------------------------------------------------
// RegistrationHandle
// ---------------------------------------------------------------------------

/// Token returned by registration and required to unregister.
///
/// Handles are plain values; the scheduler keeps no record of handles it has
/// given out. A handle goes stale when its registration ends.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle {
    key: EntityKey,
    generation: u32,
}

impl RegistrationHandle {
    pub fn key(&self) -> EntityKey {
        self.key
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistrationHandle({:?}g{})", self.key, self.generation)
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Where a registered entity currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub generation: u32,
    pub kind: KindTag,
    pub category: TickCategory,
    pub level: usize,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct Registry {
    /// The live queue. Empty (save for mid-pass registrations) while a tick
    /// is in flight.
    pub(crate) queue: FeedbackQueue,
    members: HashMap<EntityKey, Membership>,
    /// Entities unregistered while a snapshot was in flight.
    tombstones: HashSet<EntityKey>,
    in_flight: bool,
    next_generation: u32,
}

impl Registry {
    pub(crate) fn new(levels: usize) -> Self {
        Self {
            queue: FeedbackQueue::new(levels),
            members: HashMap::new(),
            tombstones: HashSet::new(),
            in_flight: false,
            next_generation: 0,
        }
    }

    pub(crate) fn register(
        &mut self,
        entity: &EntityRef,
    ) -> Result<RegistrationHandle, SchedulerError> {
        if !entity.is_valid() {
            return Err(SchedulerError::InvalidEntity);
        }
        let key = entity.key();
        if let Some(existing) = self.members.get(&key) {
            debug!(
                entity = ?key,
                kind = %existing.kind,
                level = existing.level,
                "entity already registered; keeping existing placement"
            );
            return Ok(RegistrationHandle {
                key,
                generation: existing.generation,
            });
        }

        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        self.queue.level_mut(0).append(entity.clone());
        self.members.insert(
            key,
            Membership {
                generation,
                kind: entity.kind(),
                category: entity.category(),
                level: 0,
            },
        );
        Ok(RegistrationHandle { key, generation })
    }

    pub(crate) fn unregister(
        &mut self,
        handle: RegistrationHandle,
        entity: &EntityRef,
    ) -> Result<(), SchedulerError> {
        if !entity.is_valid() {
            // Purged lazily, together with its membership record.
            return Ok(());
        }
        if handle.key != entity.key() {
            return Err(SchedulerError::HandleMismatch {
                handle,
                entity: entity.key(),
            });
        }
        let membership = match self.members.get(&handle.key) {
            Some(m) if m.generation == handle.generation => *m,
            _ => return Err(SchedulerError::StaleHandle { handle }),
        };
        self.members.remove(&handle.key);

        if let Some(group) =
            self.queue
                .level_mut(membership.level)
                .group_mut(membership.category, membership.kind)
        {
            group.remove_by_identity(handle.key);
        }
        if self.in_flight {
            self.tombstones.insert(handle.key);
        }
        Ok(())
    }

    /// Contract-checked unregistration: a stale handle is a caller bug.
    pub(crate) fn unregister_checked(&mut self, handle: RegistrationHandle, entity: &EntityRef) {
        if let Err(err) = self.unregister(handle, entity) {
            warn!(error = %err, "unregister ignored");
            debug_assert!(false, "unregister contract violated: {err}");
        }
    }

    pub(crate) fn membership(&self, key: EntityKey) -> Option<&Membership> {
        self.members.get(&key)
    }

    pub(crate) fn handle_of(&self, key: EntityKey) -> Option<RegistrationHandle> {
        self.members.get(&key).map(|m| RegistrationHandle {
            key,
            generation: m.generation,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_tombstoned(&self, key: EntityKey) -> bool {
        self.tombstones.contains(&key)
    }

    /// Record that a snapshot entry moved to `level`. Tombstoned keys belong
    /// to a different (or no) registration and are left alone.
    pub(crate) fn record_level(&mut self, key: EntityKey, level: usize) {
        if self.tombstones.contains(&key) {
            return;
        }
        if let Some(m) = self.members.get_mut(&key) {
            m.level = level;
        }
    }

    /// Drop the membership record of a purged (destroyed) entity.
    pub(crate) fn forget(&mut self, key: EntityKey) {
        if !self.tombstones.contains(&key) {
            self.members.remove(&key);
        }
    }

    /// Move the live queue out for a pass, leaving an empty one behind.
    pub(crate) fn begin_pass(&mut self) -> FeedbackQueue {
        self.in_flight = true;
        let levels = self.queue.level_count();
        std::mem::replace(&mut self.queue, FeedbackQueue::new(levels))
    }

    /// Fold a serviced snapshot back in, together with everything that was
    /// registered while it was out.
    pub(crate) fn end_pass(&mut self, mut snapshot: FeedbackQueue) {
        self.in_flight = false;
        if !self.tombstones.is_empty() {
            let tombstones = std::mem::take(&mut self.tombstones);
            snapshot.retain(|entity| !tombstones.contains(&entity.key()));
        }
        let registered_mid_pass = std::mem::replace(&mut self.queue, snapshot);
        self.queue.absorb(registered_mid_pass);
        self.queue.prune_empty();
    }

    /// Move every entity back to level 0. Returns how many moved.
    pub(crate) fn reset_priorities(&mut self) -> usize {
        let promoted = self.queue.collapse_to_top();
        for m in self.members.values_mut() {
            m.level = 0;
        }
        promoted
    }

    pub(crate) fn clear(&mut self) {
        let levels = self.queue.level_count();
        self.queue = FeedbackQueue::new(levels);
        self.members.clear();
        self.tombstones.clear();
    }
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// Registration surface handed to entities during a tick.
///
/// Entities registered here join level 0 of the live queue and first run on
/// the next tick. Entities unregistered here are never invoked again, even
/// later in the current pass.
pub struct TickContext<'a> {
    registry: &'a mut Registry,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(registry: &'a mut Registry) -> Self {
        Self { registry }
    }

    /// See [`Scheduler::register`](crate::scheduler::Scheduler::register).
    pub fn register(&mut self, entity: &EntityRef) -> Result<RegistrationHandle, SchedulerError> {
        self.registry.register(entity)
    }

    /// See [`Scheduler::unregister`](crate::scheduler::Scheduler::unregister).
    pub fn unregister(&mut self, handle: RegistrationHandle, entity: &EntityRef) {
        self.registry.unregister_checked(handle, entity);
    }

    /// See [`Scheduler::try_unregister`](crate::scheduler::Scheduler::try_unregister).
    pub fn try_unregister(
        &mut self,
        handle: RegistrationHandle,
        entity: &EntityRef,
    ) -> Result<(), SchedulerError> {
        self.registry.unregister(handle, entity)
    }

    /// Whether `entity` is currently registered.
    pub fn is_registered(&self, entity: &EntityRef) -> bool {
        self.registry.membership(entity.key()).is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
