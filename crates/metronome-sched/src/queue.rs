//! The multi-level feedback queue and its per-frame pass.
//!
//! A [`FeedbackQueue`] is an ordered list of [`PriorityLevel`]s, index 0
//! first. Each pass walks the levels in order and runs every kind group it
//! finds, primary groups before attached ones:
//!
//! 1. Entries whose entity was destroyed (or unregistered during this pass)
//!    are swap-removed without running.
//! 2. After each update call the group's elapsed time is compared with the
//!    job allotment. On overrun the not-yet-run remainder is split off and
//!    appended to the same kind's group one level down, where it may still
//!    run later in this pass. At the lowest level the group is rotated
//!    instead, so the next pass resumes with the entries that were skipped.
//! 3. After each level the tick's elapsed time is compared with the tick
//!    budget. On overrun the remaining levels are not visited this pass.
//!
//! Time is only checked between update calls; a single slow update is never
//! interrupted. A zero allotment or budget counts as exceeded as soon as it
//! is checked.

use std::time::Duration;

use tracing::{trace, warn};

use crate::clock::Clock;
use crate::entity::{EntityRef, Invocation, TickCategory};
use crate::group::KindGroup;
use crate::level::PriorityLevel;
use crate::registry::{Registry, TickContext};

// ---------------------------------------------------------------------------
// TickLimits
// ---------------------------------------------------------------------------

/// The two time limits a scheduled pass enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickLimits {
    pub job_allotment: Duration,
    pub tick_budget: Duration,
}

impl TickLimits {
    fn group_exceeded(&self, elapsed: Duration) -> bool {
        exceeded(elapsed, self.job_allotment)
    }

    fn tick_exceeded(&self, elapsed: Duration) -> bool {
        exceeded(elapsed, self.tick_budget)
    }
}

fn exceeded(elapsed: Duration, limit: Duration) -> bool {
    limit.is_zero() || elapsed > limit
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// What happened during the last tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickDiagnostics {
    /// 1-based number of the tick these diagnostics describe.
    pub tick: u64,
    /// Update calls made.
    pub invoked: usize,
    /// Destroyed entities removed from their groups.
    pub purged: usize,
    /// Entries moved one level down.
    pub demoted: usize,
    /// Live entities skipped because they were already borrowed.
    pub busy: usize,
    /// Levels visited, counting from level 0.
    pub levels_visited: usize,
    /// Whether the tick budget cut the pass short.
    pub truncated: bool,
    /// Wall-clock time spent in each visited level.
    pub level_times: Vec<Duration>,
    /// Wall-clock time for the whole tick, including the rebuild.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// FeedbackQueue
// ---------------------------------------------------------------------------

/// Priority levels, highest priority first.
#[derive(Debug, Clone)]
pub struct FeedbackQueue {
    levels: Vec<PriorityLevel>,
}

impl FeedbackQueue {
    /// A queue with `levels` empty levels (at least one).
    pub fn new(levels: usize) -> Self {
        Self {
            levels: (0..levels.max(1)).map(|_| PriorityLevel::new()).collect(),
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// The level at `index`, clamped to the lowest level.
    pub fn level(&self, index: usize) -> &PriorityLevel {
        &self.levels[index.min(self.levels.len() - 1)]
    }

    /// Mutable access to the level at `index`, clamped to the lowest level.
    pub fn level_mut(&mut self, index: usize) -> &mut PriorityLevel {
        let last = self.levels.len() - 1;
        &mut self.levels[index.min(last)]
    }

    pub fn levels(&self) -> &[PriorityLevel] {
        &self.levels
    }

    /// Total entries across all levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(PriorityLevel::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(PriorityLevel::is_empty)
    }

    /// Merge `other` into this queue level by level, lowest level first.
    /// Levels beyond this queue's depth land in the lowest level.
    pub fn absorb(&mut self, other: FeedbackQueue) {
        for (index, level) in other.levels.into_iter().enumerate().rev() {
            self.level_mut(index).absorb(level);
        }
    }

    /// Keep only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&EntityRef) -> bool) {
        for level in &mut self.levels {
            level.for_each_group_mut(|group| group.retain(&mut keep));
        }
    }

    pub fn prune_empty(&mut self) {
        for level in &mut self.levels {
            level.prune_empty();
        }
    }

    /// Move every entry below level 0 back into level 0. Returns how many
    /// entries moved.
    pub fn collapse_to_top(&mut self) -> usize {
        let mut moved = 0;
        let mut lower: Vec<PriorityLevel> = self.levels.drain(1..).collect();
        for level in lower.iter_mut().rev() {
            moved += level.len();
            self.levels[0].absorb(std::mem::take(level));
        }
        self.levels.extend(lower);
        moved
    }

    /// Run one time-sliced pass. Demotions are applied in place and
    /// recorded in `registry`.
    pub(crate) fn run_scheduled<C: Clock>(
        &mut self,
        dt: f64,
        limits: TickLimits,
        clock: &C,
        registry: &mut Registry,
    ) -> TickDiagnostics {
        let mut diag = TickDiagnostics::default();
        let tick_start = clock.now();
        let last = self.levels.len() - 1;

        for level in 0..self.levels.len() {
            let level_start = clock.now();
            diag.levels_visited += 1;

            for category in TickCategory::ALL {
                let group_count = self.levels[level].group_count(category);
                for index in 0..group_count {
                    let Some(group) = self.levels[level].group_at_mut(category, index) else {
                        continue;
                    };
                    let Some(resume_at) =
                        run_group(group, dt, Some(&limits), clock, registry, &mut diag)
                    else {
                        continue;
                    };

                    if level == last {
                        group.rotate_to(resume_at);
                        trace!(
                            kind = %group.kind(),
                            level,
                            resume_at,
                            "allotment exceeded at lowest level; rotating"
                        );
                        continue;
                    }

                    let tail = group.take_suffix_from(resume_at);
                    trace!(
                        kind = %tail.kind(),
                        from = level,
                        to = level + 1,
                        count = tail.len(),
                        "allotment exceeded; demoting remainder"
                    );
                    for entity in &tail {
                        registry.record_level(entity.key(), level + 1);
                    }
                    diag.demoted += tail.len();
                    self.levels[level + 1].append_many(category, tail);
                }
            }

            diag.level_times.push(clock.since(level_start));

            let elapsed = clock.since(tick_start);
            if level < last && limits.tick_exceeded(elapsed) {
                diag.truncated = true;
                warn!(
                    level,
                    skipped = last - level,
                    elapsed_us = elapsed.as_micros() as u64,
                    budget_us = limits.tick_budget.as_micros() as u64,
                    "tick budget exceeded; skipping lower levels"
                );
                break;
            }
        }

        diag
    }

    /// Run every entry once, ignoring time. Used when time-slicing is
    /// disabled.
    pub(crate) fn run_flat<C: Clock>(
        &mut self,
        dt: f64,
        clock: &C,
        registry: &mut Registry,
    ) -> TickDiagnostics {
        let mut diag = TickDiagnostics::default();
        for level in &mut self.levels {
            let level_start = clock.now();
            diag.levels_visited += 1;
            for category in TickCategory::ALL {
                for index in 0..level.group_count(category) {
                    if let Some(group) = level.group_at_mut(category, index) {
                        run_group(group, dt, None, clock, registry, &mut diag);
                    }
                }
            }
            diag.level_times.push(clock.since(level_start));
        }
        diag
    }
}

/// Run `group` from its front. Returns the index of the first entry that did
/// not get to run if the allotment was exceeded with entries left over.
fn run_group<C: Clock>(
    group: &mut KindGroup,
    dt: f64,
    limits: Option<&TickLimits>,
    clock: &C,
    registry: &mut Registry,
    diag: &mut TickDiagnostics,
) -> Option<usize> {
    if group.is_empty() {
        return None;
    }
    let group_start = clock.now();
    let mut cursor = 0;

    while let Some(entity) = group.get(cursor) {
        let key = entity.key();
        if registry.is_tombstoned(key) {
            group.swap_remove(cursor);
            continue;
        }

        let entity = entity.clone();
        match entity.invoke(dt, &mut TickContext::new(registry)) {
            Invocation::Invalid => {
                group.swap_remove(cursor);
                registry.forget(key);
                diag.purged += 1;
                continue;
            }
            Invocation::Busy => {
                diag.busy += 1;
                warn!(entity = ?key, kind = %entity.kind(), "entity already borrowed; skipped");
            }
            Invocation::Invoked => diag.invoked += 1,
        }
        cursor += 1;

        if let Some(limits) = limits {
            if cursor < group.len() && limits.group_exceeded(clock.since(group_start)) {
                return Some(cursor);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
