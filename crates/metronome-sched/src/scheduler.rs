//! The public scheduler facade.
//!
//! Entities register on activation and unregister on deactivation; the host
//! calls [`Scheduler::tick`] once per frame. Everything else (snapshotting
//! the queue so entity callbacks can register and unregister mid-pass,
//! keeping the membership index in step with demotions, purging destroyed
//! entities) happens behind these calls.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use metronome_sched::prelude::*;
//!
//! struct Spinner { turns: u32 }
//!
//! impl Tickable for Spinner {
//!     fn tick(&mut self, _dt: f64, _ctx: &mut TickContext<'_>) {
//!         self.turns += 1;
//!     }
//! }
//!
//! let config = SchedulerConfig {
//!     enabled: true,
//!     job_allotment: 0.002,
//!     tick_budget: 0.008,
//!     ..Default::default()
//! };
//! let mut scheduler = Scheduler::new(config);
//!
//! let spinner = Rc::new(RefCell::new(Spinner { turns: 0 }));
//! let entity = EntityRef::new(&spinner);
//! let handle = scheduler.register(&entity).unwrap();
//!
//! scheduler.tick(1.0 / 60.0);
//! assert_eq!(spinner.borrow().turns, 1);
//!
//! scheduler.unregister(handle, &entity);
//! assert!(scheduler.is_empty());
//! ```

use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::SchedulerConfig;
use crate::entity::EntityRef;
use crate::queue::{FeedbackQueue, TickDiagnostics, TickLimits};
use crate::registry::{Membership, RegistrationHandle, Registry};
use crate::SchedulerError;

/// Multi-level feedback queue scheduler for per-frame entity updates.
///
/// Single-threaded and cooperative: entities are `Rc<RefCell<_>>`, update
/// calls run to completion, and time limits are checked only between calls.
pub struct Scheduler<C: Clock = MonotonicClock> {
    config: SchedulerConfig,
    clock: C,
    registry: Registry,
    tick_counter: u64,
    last_diagnostics: TickDiagnostics,
}

impl Scheduler<MonotonicClock> {
    /// A scheduler timed by the wall clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> Scheduler<C> {
    /// A scheduler timed by `clock`.
    ///
    /// An invalid config is not fatal: every field is read through clamping
    /// accessors, so the problem is logged and the scheduler still runs.
    pub fn with_clock(config: SchedulerConfig, clock: C) -> Self {
        if let Err(err) = config.validate() {
            warn!(error = %err, "scheduler config out of range; using clamped values");
        }
        let levels = config.level_count();
        info!(
            enabled = config.enabled,
            levels,
            job_allotment_us = config.job_allotment().as_micros() as u64,
            tick_budget_us = config.tick_budget().as_micros() as u64,
            "scheduler created"
        );
        Self {
            config,
            clock,
            registry: Registry::new(levels),
            tick_counter: 0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    // -- registration -------------------------------------------------------

    /// Register `entity` at level 0.
    ///
    /// An entity that is already registered keeps its current placement and
    /// the existing handle is returned. A destroyed entity is rejected.
    pub fn register(&mut self, entity: &EntityRef) -> Result<RegistrationHandle, SchedulerError> {
        self.registry.register(entity)
    }

    /// Unregister `entity`.
    ///
    /// A destroyed entity is ignored (it is purged lazily). A stale handle, or
    /// one that belongs to a different entity, is a caller bug: it trips a
    /// debug assertion and is otherwise a logged no-op.
    pub fn unregister(&mut self, handle: RegistrationHandle, entity: &EntityRef) {
        self.registry.unregister_checked(handle, entity);
    }

    /// Like [`unregister`](Self::unregister) but reports contract violations
    /// as errors instead of asserting.
    pub fn try_unregister(
        &mut self,
        handle: RegistrationHandle,
        entity: &EntityRef,
    ) -> Result<(), SchedulerError> {
        self.registry.unregister(handle, entity)
    }

    /// Unregister everything.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    // -- ticking ------------------------------------------------------------

    /// Run one frame's worth of updates.
    ///
    /// `dt` is forwarded to every update call; it plays no part in
    /// scheduling decisions.
    pub fn tick(&mut self, dt: f64) -> &TickDiagnostics {
        let tick_start = self.clock.now();
        let mut snapshot = self.registry.begin_pass();

        let mut diag = if self.config.enabled {
            let limits = TickLimits {
                job_allotment: self.config.job_allotment(),
                tick_budget: self.config.tick_budget(),
            };
            snapshot.run_scheduled(dt, limits, &self.clock, &mut self.registry)
        } else {
            snapshot.run_flat(dt, &self.clock, &mut self.registry)
        };

        self.registry.end_pass(snapshot);
        self.tick_counter += 1;

        if let Some(interval) = self.config.priority_reset_interval {
            if interval > 0 && self.tick_counter % interval == 0 {
                let promoted = self.registry.reset_priorities();
                debug!(tick = self.tick_counter, promoted, "periodic priority reset");
            }
        }

        diag.tick = self.tick_counter;
        diag.total_time = self.clock.since(tick_start);
        debug!(
            tick = diag.tick,
            invoked = diag.invoked,
            demoted = diag.demoted,
            purged = diag.purged,
            levels_visited = diag.levels_visited,
            truncated = diag.truncated,
            elapsed_us = diag.total_time.as_micros() as u64,
            "tick complete"
        );
        self.last_diagnostics = diag;
        &self.last_diagnostics
    }

    /// Move every entity back to level 0. Returns how many were promoted.
    pub fn reset_priorities(&mut self) -> usize {
        self.registry.reset_priorities()
    }

    // -- accessors ----------------------------------------------------------

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Whether `entity` is registered.
    pub fn is_registered(&self, entity: &EntityRef) -> bool {
        self.registry.membership(entity.key()).is_some()
    }

    /// The current handle for `entity`, if registered.
    pub fn handle_of(&self, entity: &EntityRef) -> Option<RegistrationHandle> {
        self.registry.handle_of(entity.key())
    }

    /// Current placement of `entity`, if registered.
    pub fn membership(&self, entity: &EntityRef) -> Option<Membership> {
        self.registry.membership(entity.key()).copied()
    }

    /// Current level of the registration behind `handle`. `None` if the
    /// handle is stale.
    pub fn level_of(&self, handle: RegistrationHandle) -> Option<usize> {
        self.registry
            .membership(handle.key())
            .filter(|m| m.generation == handle.generation())
            .map(|m| m.level)
    }

    /// Entries queued at `level` (destroyed-but-unpurged entries included).
    pub fn level_len(&self, level: usize) -> usize {
        if level >= self.registry.queue.level_count() {
            return 0;
        }
        self.registry.queue.level(level).len()
    }

    pub fn level_count(&self) -> usize {
        self.registry.queue.level_count()
    }

    /// Read-only view of the queue.
    pub fn queue(&self) -> &FeedbackQueue {
        &self.registry.queue
    }

    /// The number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Diagnostics from the last tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl Default for Scheduler<MonotonicClock> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
