//! Metronome Sched -- multi-level feedback queue for per-frame entity updates.
//!
//! Large, changing populations of game entities each need a small update
//! every frame. This crate batches those updates by entity kind (so all
//! entities sharing an update routine run back to back) and time-slices them
//! with a classic multi-level feedback queue:
//!
//! - New registrations enter priority level 0.
//! - Each frame, levels are serviced from 0 downwards. Within a level every
//!   primary kind group runs before any attached kind group.
//! - A kind group that runs past the **job allotment** has its unvisited
//!   remainder demoted one level. Demotion is permanent (unless a priority
//!   reset is configured or requested).
//! - Once the whole tick runs past the **tick budget**, lower levels are
//!   skipped for that frame.
//!
//! Entities are owned by the caller as `Rc<RefCell<T>>`; the scheduler holds
//! weak [`EntityRef`](entity::EntityRef)s and lazily purges the ones whose
//! entity has been dropped. Update calls may register and unregister entities
//! through their [`TickContext`](registry::TickContext): the queue is moved
//! out for the duration of the pass and rebuilt afterwards.
//!
//! # Known limitation
//!
//! Nothing promotes an entity on its own. With the default config, an
//! entity that was demoted to a low level stays there until it is
//! re-registered, and a tick budget that is exceeded every frame starves the
//! lowest levels indefinitely. Set
//! [`SchedulerConfig::priority_reset_interval`](config::SchedulerConfig::priority_reset_interval)
//! or call [`Scheduler::reset_priorities`](scheduler::Scheduler::reset_priorities)
//! to sweep everything back to level 0.

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod entity;
pub mod group;
pub mod level;
pub mod queue;
pub mod registry;
pub mod scheduler;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registration operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The entity was already destroyed when it was registered.
    #[error("cannot register an entity that has already been destroyed")]
    InvalidEntity,

    /// The handle's registration has ended (or never existed here).
    #[error("stale registration handle {handle:?}")]
    StaleHandle {
        handle: registry::RegistrationHandle,
    },

    /// The handle belongs to a different entity than the one passed in.
    #[error("registration handle {handle:?} does not belong to entity {entity:?}")]
    HandleMismatch {
        handle: registry::RegistrationHandle,
        entity: entity::EntityKey,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, MonotonicClock};
    pub use crate::config::{ConfigError, SchedulerConfig};
    pub use crate::entity::{EntityKey, EntityRef, Invocation, KindTag, TickCategory, Tickable};
    pub use crate::group::KindGroup;
    pub use crate::level::PriorityLevel;
    pub use crate::queue::{FeedbackQueue, TickDiagnostics, TickLimits};
    pub use crate::registry::{Membership, RegistrationHandle, TickContext};
    pub use crate::scheduler::Scheduler;
    pub use crate::SchedulerError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
