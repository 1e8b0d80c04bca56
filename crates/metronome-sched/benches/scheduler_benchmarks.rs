//! Scheduler overhead benchmarks.
//!
//! Entities here do almost no work, so the numbers are dominated by the
//! scheduler itself: the queue snapshot and rebuild, per-entity weak
//! upgrades, clock reads, and demotion bookkeeping.
//!
//! Run with: `cargo bench --bench scheduler_benchmarks`

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use metronome_sched::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark entity types
// ---------------------------------------------------------------------------

struct Particle {
    x: f64,
    vx: f64,
}

impl Tickable for Particle {
    fn tick(&mut self, dt: f64, _ctx: &mut TickContext<'_>) {
        self.x += self.vx * dt;
    }
}

struct Emitter {
    phase: f64,
}

impl Tickable for Emitter {
    fn tick(&mut self, dt: f64, _ctx: &mut TickContext<'_>) {
        self.phase = (self.phase + dt).fract();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Population = (Vec<Rc<RefCell<Particle>>>, Vec<Rc<RefCell<Emitter>>>);

/// Half particles, half emitters attached after them.
fn populate(scheduler: &mut Scheduler, count: usize) -> Population {
    let particles: Vec<_> = (0..count / 2)
        .map(|i| {
            Rc::new(RefCell::new(Particle {
                x: i as f64,
                vx: 1.0,
            }))
        })
        .collect();
    let emitters: Vec<_> = (0..count - count / 2)
        .map(|_| Rc::new(RefCell::new(Emitter { phase: 0.0 })))
        .collect();

    for p in &particles {
        scheduler.register(&EntityRef::new(p)).unwrap();
    }
    for e in &emitters {
        scheduler.register(&EntityRef::attached(e)).unwrap();
    }
    (particles, emitters)
}

fn enabled(job_allotment: f64, tick_budget: f64) -> SchedulerConfig {
    SchedulerConfig {
        enabled: true,
        job_allotment,
        tick_budget,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Benchmark 1: flat pass (time-slicing disabled)
// ---------------------------------------------------------------------------

fn bench_flat_pass(c: &mut Criterion) {
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let _population = populate(&mut scheduler, 10_000);

    c.bench_function("flat_pass_10k", |b| {
        b.iter(|| {
            let diag = scheduler.tick(black_box(1.0 / 60.0));
            black_box(diag.invoked);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 2: scheduled pass with generous limits (no demotion)
// ---------------------------------------------------------------------------

fn bench_scheduled_pass(c: &mut Criterion) {
    let mut scheduler = Scheduler::new(enabled(1.0, 1.0));
    let _population = populate(&mut scheduler, 10_000);

    c.bench_function("scheduled_pass_10k", |b| {
        b.iter(|| {
            let diag = scheduler.tick(black_box(1.0 / 60.0));
            black_box(diag.invoked);
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 3: scaling across population sizes
// ---------------------------------------------------------------------------

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduled_scaling");

    for &count in &[100usize, 1_000, 10_000, 50_000] {
        let mut scheduler = Scheduler::new(enabled(1.0, 1.0));
        let _population = populate(&mut scheduler, count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &_count| {
            b.iter(|| {
                let diag = scheduler.tick(1.0 / 60.0);
                black_box(diag.invoked);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 4: registration churn
// ---------------------------------------------------------------------------
// Registers and unregisters a batch every iteration on top of a standing
// population, then ticks once so the rebuild path is included.

fn bench_registration_churn(c: &mut Criterion) {
    let mut scheduler = Scheduler::new(enabled(1.0, 1.0));
    let _population = populate(&mut scheduler, 5_000);
    let batch: Vec<_> = (0..500)
        .map(|i| {
            Rc::new(RefCell::new(Particle {
                x: i as f64,
                vx: -1.0,
            }))
        })
        .collect();
    let refs: Vec<_> = batch.iter().map(EntityRef::new).collect();

    c.bench_function("registration_churn_500_of_5k", |b| {
        b.iter(|| {
            let handles: Vec<_> = refs
                .iter()
                .map(|r| scheduler.register(r).unwrap())
                .collect();
            scheduler.tick(1.0 / 60.0);
            for (handle, r) in handles.into_iter().zip(&refs) {
                scheduler.unregister(handle, r);
            }
            black_box(scheduler.len());
        });
    });
}

// ---------------------------------------------------------------------------
// Benchmark 5: lazy purge of destroyed entities
// ---------------------------------------------------------------------------

fn bench_lazy_purge(c: &mut Criterion) {
    c.bench_function("purge_10k_destroyed", |b| {
        b.iter_batched(
            || {
                let mut scheduler = Scheduler::new(enabled(1.0, 1.0));
                // Population dropped at the end of setup; every entry is dead.
                drop(populate(&mut scheduler, 10_000));
                scheduler
            },
            |mut scheduler| {
                let diag = scheduler.tick(1.0 / 60.0);
                black_box(diag.purged);
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_flat_pass,
    bench_scheduled_pass,
    bench_scaling,
    bench_registration_churn,
    bench_lazy_purge,
);
criterion_main!(benches);
