//! Time sources for allotment and budget checks.
//!
//! The scheduler never sleeps and never preempts; it only asks "how long has
//! this group / this tick been running?" between whole update calls. The
//! [`Clock`] trait is that question. [`MonotonicClock`] answers it with
//! [`Instant`]; [`ManualClock`] answers it with a value the caller advances,
//! which makes demotion and truncation fully deterministic in tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source measured from an arbitrary, fixed origin.
pub trait Clock {
    /// Time elapsed since this clock's origin. Must never go backwards.
    fn now(&self) -> Duration;

    /// Time elapsed since an earlier reading of [`now`](Self::now).
    fn since(&self, earlier: Duration) -> Duration {
        self.now().saturating_sub(earlier)
    }
}

// ---------------------------------------------------------------------------
// MonotonicClock
// ---------------------------------------------------------------------------

/// Wall-clock time backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// A clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// the scheduler and others to entities that "spend" time in their update.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// A clock stopped at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Jump to an absolute reading. Going backwards is ignored.
    pub fn set(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
