//! Crowd demo: a few hundred entities with uneven update costs.
//!
//! Walkers burn a seeded amount of CPU per update; nameplates are attached
//! entities that run after every walker in their level. Every few frames the
//! demo prints how the population is spread across priority levels, then a
//! JSON report of the final frame.
//!
//! Run with: `RUST_LOG=metronome_sched=debug cargo run --example crowd`
//!
//! An optional first argument names a JSON `FrameConfig` file.

use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use metronome_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing_subscriber::EnvFilter;

const WALKERS: usize = 400;
const FRAMES: u64 = 120;
const SEED: u64 = 0x5EED;

/// Spins for `cost` of wall time.
fn busy_work(cost: Duration) -> u64 {
    let start = Instant::now();
    let mut acc = 0u64;
    while start.elapsed() < cost {
        acc = black_box(acc.wrapping_mul(6364136223846793005).wrapping_add(1));
    }
    acc
}

struct Walker {
    cost: Duration,
    x: f64,
    speed: f64,
    scratch: u64,
}

impl Tickable for Walker {
    fn tick(&mut self, dt: f64, _ctx: &mut TickContext<'_>) {
        self.x += self.speed * dt;
        self.scratch = busy_work(self.cost);
    }
}

struct Nameplate {
    redraws: u64,
}

impl Tickable for Nameplate {
    fn tick(&mut self, _dt: f64, _ctx: &mut TickContext<'_>) {
        self.redraws += 1;
    }
}

fn load_config() -> anyhow::Result<FrameConfig> {
    match std::env::args().nth(1) {
        Some(path) => FrameConfig::from_json_file(&path)
            .with_context(|| format!("loading frame config from {path}")),
        None => Ok(FrameConfig {
            fixed_dt: 1.0 / 60.0,
            scheduler: SchedulerConfig {
                enabled: true,
                job_allotment: 0.001,
                tick_budget: 0.004,
                levels: 4,
                priority_reset_interval: Some(600),
            },
        }),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = load_config()?;
    let mut frames = FrameLoop::new(config);

    let mut rng = Pcg64::seed_from_u64(SEED);
    let walkers: Vec<_> = (0..WALKERS)
        .map(|_| {
            Rc::new(RefCell::new(Walker {
                cost: Duration::from_micros(rng.gen_range(1..40)),
                x: 0.0,
                speed: rng.gen_range(0.5..2.0),
                scratch: 0,
            }))
        })
        .collect();
    let plates: Vec<_> = (0..WALKERS / 8)
        .map(|_| Rc::new(RefCell::new(Nameplate { redraws: 0 })))
        .collect();

    for w in &walkers {
        frames.register(&EntityRef::new(w))?;
    }
    for p in &plates {
        frames.register(&EntityRef::attached(p))?;
    }

    for _ in 0..FRAMES {
        let diag = frames.frame();
        let (invoked, truncated) = (diag.invoked, diag.truncated);
        if frames.frame_count() % 20 == 0 {
            println!(
                "frame {:>4}  invoked {:>4}  truncated {:<5}  levels {:?}",
                frames.frame_count(),
                invoked,
                truncated,
                frames.occupancy()
            );
        }
    }

    let farthest = walkers
        .iter()
        .map(|w| w.borrow().x)
        .fold(0.0_f64, f64::max);
    println!("farthest walker: {farthest:.2}");
    println!("total updates: {}", frames.total_invocations());
    println!("{}", serde_json::to_string_pretty(&frames.report())?);
    Ok(())
}
