//! Tickable entities, kind tags, and weak entity references.
//!
//! The scheduler never owns the entities it drives. Callers keep their
//! entities in `Rc<RefCell<T>>` and hand the scheduler an [`EntityRef`]: a
//! weak reference that remembers the entity's [`KindTag`] and
//! [`TickCategory`]. Once the last `Rc` is dropped the reference reports
//! invalid and the scheduler purges it the next time its group is visited.

use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::registry::TickContext;

// ---------------------------------------------------------------------------
// Tickable
// ---------------------------------------------------------------------------

/// Per-frame update work for one entity.
///
/// `dt` is the frame's elapsed time, forwarded untouched from
/// [`Scheduler::tick`](crate::scheduler::Scheduler::tick). The `ctx` lets an
/// entity register or unregister entities (itself included) while the pass
/// is in flight.
pub trait Tickable {
    fn tick(&mut self, dt: f64, ctx: &mut TickContext<'_>);
}

// ---------------------------------------------------------------------------
// TickCategory
// ---------------------------------------------------------------------------

/// Which group map an entity lives in within a priority level.
///
/// Primary groups always run before attached groups at the same level, so an
/// attached entity observes its owner's state from earlier in the same frame
/// (or from the previous frame if the owner was demoted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TickCategory {
    Primary,
    Attached,
}

impl TickCategory {
    /// Service order within one level.
    pub const ALL: [TickCategory; 2] = [TickCategory::Primary, TickCategory::Attached];
}

// ---------------------------------------------------------------------------
// KindTag
// ---------------------------------------------------------------------------

/// Identifies a batch of entities that are ticked together.
///
/// A kind is a Rust type. By default an entity's kind is its own concrete
/// type; a marker type can be used to group several entity types, or to
/// split one type into several kinds. Comparison is by [`TypeId`] only, so two
/// unrelated types never merge even if they share a name.
#[derive(Clone, Copy)]
pub struct KindTag {
    id: TypeId,
    name: &'static str,
}

impl KindTag {
    /// The kind tag for type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The fully-qualified type name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for KindTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for KindTag {}

impl Hash for KindTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for KindTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KindTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KindTag({})", self.name)
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// Identity of an entity: the address of its shared allocation.
///
/// The address cannot be reused while any [`EntityRef`] to it is alive, and
/// the scheduler drops its membership record for a key no later than it
/// drops its last reference, so a key never aliases two entities inside one
/// scheduler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(usize);

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({:#x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// Result of asking an [`EntityRef`] to run one update step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// The entity ran.
    Invoked,
    /// The entity is gone; the reference should be purged.
    Invalid,
    /// The entity is alive but already mutably borrowed (it is further up
    /// the call stack). It was skipped for this visit.
    Busy,
}

/// A weak, liveness-checked reference to a tickable entity.
#[derive(Clone)]
pub struct EntityRef {
    entity: Weak<RefCell<dyn Tickable>>,
    kind: KindTag,
    category: TickCategory,
}

impl EntityRef {
    /// A primary reference whose kind is `T`.
    pub fn new<T: Tickable + 'static>(entity: &Rc<RefCell<T>>) -> Self {
        let shared: Rc<RefCell<dyn Tickable>> = entity.clone();
        Self {
            entity: Rc::downgrade(&shared),
            kind: KindTag::of::<T>(),
            category: TickCategory::Primary,
        }
    }

    /// An attached reference whose kind is `T`.
    pub fn attached<T: Tickable + 'static>(entity: &Rc<RefCell<T>>) -> Self {
        Self::new(entity).with_category(TickCategory::Attached)
    }

    /// Override the kind tag.
    pub fn with_kind(mut self, kind: KindTag) -> Self {
        self.kind = kind;
        self
    }

    /// Override the category.
    pub fn with_category(mut self, category: TickCategory) -> Self {
        self.category = category;
        self
    }

    pub fn kind(&self) -> KindTag {
        self.kind
    }

    pub fn category(&self) -> TickCategory {
        self.category
    }

    /// Identity of the referenced allocation.
    pub fn key(&self) -> EntityKey {
        EntityKey(self.entity.as_ptr() as *const () as usize)
    }

    /// Whether the referenced entity still exists.
    pub fn is_valid(&self) -> bool {
        self.entity.strong_count() > 0
    }

    /// Whether both references point at the same entity.
    pub fn same_entity(&self, other: &EntityRef) -> bool {
        self.key() == other.key()
    }

    /// Run one update step if the entity is alive and not already borrowed.
    pub fn invoke(&self, dt: f64, ctx: &mut TickContext<'_>) -> Invocation {
        let Some(entity) = self.entity.upgrade() else {
            return Invocation::Invalid;
        };
        let Ok(mut entity) = entity.try_borrow_mut() else {
            return Invocation::Busy;
        };
        entity.tick(dt, ctx);
        Invocation::Invoked
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("key", &self.key())
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("valid", &self.is_valid())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
