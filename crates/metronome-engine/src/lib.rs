//! Metronome Engine -- fixed-timestep host for the metronome scheduler.
//!
//! This crate builds on [`metronome_sched`] to provide the frame driver: a
//! loop that calls [`Scheduler::tick`](metronome_sched::scheduler::Scheduler::tick)
//! once per frame with a fixed `dt`, tracks simulation time, and reports how
//! entities are spread across the priority levels.
//!
//! # Quick Start
//!
//! ```
//! use metronome_engine::prelude::*;
//!
//! let config = FrameConfig::from_json_str(
//!     r#"{ "fixed_dt": 0.02, "scheduler": { "enabled": true, "job_allotment": 0.002, "tick_budget": 0.01 } }"#,
//! )
//! .unwrap();
//! let mut frames = FrameLoop::new(config);
//!
//! frames.run_frames(50);
//! assert_eq!(frames.frame_count(), 50);
//! assert!((frames.sim_time() - 1.0).abs() < 1e-9);
//! ```

#![deny(unsafe_code)]

pub mod frame;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the scheduler crate for convenience.
pub use metronome_sched;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while setting up a frame loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The frame timestep is zero, negative, NaN or infinite.
    #[error("fixed_dt must be positive and finite, got {value}")]
    InvalidTimestep { value: f64 },

    /// The nested scheduler section failed validation.
    #[error(transparent)]
    Config(#[from] metronome_sched::config::ConfigError),

    /// The config text is not valid JSON for a frame config.
    #[error("failed to parse frame config: {0}")]
    Json(#[from] serde_json::Error),

    /// The config file could not be read.
    #[error("failed to read frame config: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the scheduler prelude.
    pub use metronome_sched::prelude::*;

    pub use crate::frame::{FrameConfig, FrameLoop, FrameReport};
    pub use crate::EngineError;
}
