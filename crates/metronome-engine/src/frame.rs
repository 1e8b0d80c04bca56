//! Fixed-timestep frame loop hosting a [`Scheduler`].
//!
//! The [`FrameLoop`] is the piece of a game that calls
//! [`Scheduler::tick`] once per frame. Each frame:
//!
//! 1. The scheduler services its priority levels with the loop's fixed `dt`.
//! 2. The frame counter advances.
//!
//! Simulation time is derived from the frame counter (`frames * fixed_dt`),
//! never accumulated, so it does not drift.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use metronome_engine::prelude::*;
//!
//! struct Blinker { on: bool }
//!
//! impl Tickable for Blinker {
//!     fn tick(&mut self, _dt: f64, _ctx: &mut TickContext<'_>) {
//!         self.on = !self.on;
//!     }
//! }
//!
//! let mut frames = FrameLoop::new(FrameConfig::default());
//! let blinker = Rc::new(RefCell::new(Blinker { on: false }));
//! frames.register(&EntityRef::new(&blinker)).unwrap();
//!
//! assert_eq!(frames.run_frames(3), 3);
//! assert!(blinker.borrow().on);
//! assert_eq!(frames.frame_count(), 3);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use metronome_sched::clock::{Clock, MonotonicClock};
use metronome_sched::config::SchedulerConfig;
use metronome_sched::entity::EntityRef;
use metronome_sched::queue::TickDiagnostics;
use metronome_sched::registry::RegistrationHandle;
use metronome_sched::scheduler::Scheduler;
use metronome_sched::SchedulerError;

use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Configuration for the frame loop.
///
/// `fixed_dt` is the duration in seconds of each frame. The nested
/// `scheduler` section is handed to the [`Scheduler`] unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Fixed time step in seconds per frame. Must be positive and finite.
    pub fixed_dt: f64,
    /// Feedback queue tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for FrameConfig {
    /// Defaults to 60 Hz with the scheduler's defaults.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl FrameConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let config: FrameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the timestep and the scheduler section.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidTimestep {
                value: self.fixed_dt,
            });
        }
        self.scheduler.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FrameReport
// ---------------------------------------------------------------------------

/// Serializable snapshot of where entities sit after a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: u64,
    pub sim_time: f64,
    /// Registered entities, including destroyed ones not yet purged.
    pub registered: usize,
    /// Entries per priority level, level 0 first.
    pub occupancy: Vec<usize>,
    pub invoked: usize,
    pub demoted: usize,
    pub purged: usize,
    pub truncated: bool,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Drives a [`Scheduler`] at a fixed timestep.
pub struct FrameLoop<C: Clock = MonotonicClock> {
    /// The scheduler being driven.
    scheduler: Scheduler<C>,
    /// Number of frames executed so far.
    frame_counter: u64,
    /// Fixed time step in seconds per frame.
    fixed_dt: f64,
    /// Update calls made across all frames.
    total_invocations: u64,
}

impl FrameLoop<MonotonicClock> {
    /// Create a frame loop timed by the wall clock.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(config: FrameConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> FrameLoop<C> {
    /// Create a frame loop whose scheduler is timed by `clock`.
    ///
    /// The frame counter starts at 0 and simulation time at 0.0.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn with_clock(config: FrameConfig, clock: C) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        info!(fixed_dt = config.fixed_dt, "frame loop created");
        Self {
            scheduler: Scheduler::with_clock(config.scheduler, clock),
            frame_counter: 0,
            fixed_dt: config.fixed_dt,
            total_invocations: 0,
        }
    }

    /// Register an entity with the scheduler.
    pub fn register(&mut self, entity: &EntityRef) -> Result<RegistrationHandle, SchedulerError> {
        self.scheduler.register(entity)
    }

    /// Unregister an entity from the scheduler.
    pub fn unregister(&mut self, handle: RegistrationHandle, entity: &EntityRef) {
        self.scheduler.unregister(handle, entity);
    }

    /// Execute one frame: a single scheduler tick with the fixed `dt`.
    pub fn frame(&mut self) -> &TickDiagnostics {
        let diag = self.scheduler.tick(self.fixed_dt);
        self.frame_counter += 1;
        self.total_invocations += diag.invoked as u64;
        if diag.truncated {
            debug!(
                frame = self.frame_counter,
                levels_visited = diag.levels_visited,
                "frame cut short by tick budget"
            );
        }
        diag
    }

    /// Run `count` frames in sequence. Returns the number of update calls
    /// made across those frames.
    pub fn run_frames(&mut self, count: u64) -> u64 {
        let mut invoked = 0u64;
        for _ in 0..count {
            invoked += self.frame().invoked as u64;
        }
        invoked
    }

    /// Build a [`FrameReport`] for the most recent frame.
    pub fn report(&self) -> FrameReport {
        let diag = self.scheduler.last_diagnostics();
        FrameReport {
            frame: self.frame_counter,
            sim_time: self.sim_time(),
            registered: self.scheduler.len(),
            occupancy: self.occupancy(),
            invoked: diag.invoked,
            demoted: diag.demoted,
            purged: diag.purged,
            truncated: diag.truncated,
        }
    }

    // -- accessors ----------------------------------------------------------

    /// The number of frames executed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// The current simulation time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.frame_counter as f64 * self.fixed_dt
    }

    /// The fixed time step in seconds per frame.
    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    /// Update calls made since the loop was created.
    pub fn total_invocations(&self) -> u64 {
        self.total_invocations
    }

    /// Entries per priority level, level 0 first.
    pub fn occupancy(&self) -> Vec<usize> {
        (0..self.scheduler.level_count())
            .map(|level| self.scheduler.level_len(level))
            .collect()
    }

    /// Read-only access to the scheduler.
    pub fn scheduler(&self) -> &Scheduler<C> {
        &self.scheduler
    }

    /// Mutable access to the scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<C> {
        &mut self.scheduler
    }

    /// Diagnostics from the last frame's tick.
    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        self.scheduler.last_diagnostics()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
