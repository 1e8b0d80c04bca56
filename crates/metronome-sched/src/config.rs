//! Scheduler configuration.
//!
//! Loaded once at startup (typically from a JSON settings file) and handed to
//! [`Scheduler::new`](crate::scheduler::Scheduler::new). Durations are plain
//! `f64` seconds on the wire; the scheduler reads them through
//! [`SchedulerConfig::job_allotment`] and [`SchedulerConfig::tick_budget`],
//! which never fail: negative values read as zero and infinity reads as
//! "unlimited".

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Number of priority levels used when none is configured.
pub const DEFAULT_LEVELS: usize = 4;

/// Upper bound on the number of priority levels.
pub const MAX_LEVELS: usize = 16;

/// Errors produced while loading or validating a [`SchedulerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read scheduler config: {0}")]
    Io(#[from] std::io::Error),

    /// The settings text is not valid JSON for this config.
    #[error("failed to parse scheduler config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A duration field is NaN or infinite.
    #[error("'{field}' must be a finite number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },

    /// The level count is outside `1..=MAX_LEVELS`.
    #[error("'levels' must be between 1 and 16, got {levels}")]
    InvalidLevels { levels: usize },

    /// A priority reset interval of zero ticks.
    #[error("'priority_reset_interval' must be at least 1 tick when set")]
    ZeroResetInterval,
}

/// Tuning knobs for the feedback queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// When `false`, every registered entity runs once per tick with no
    /// demotion and no budget.
    pub enabled: bool,
    /// Seconds one kind group may run within a tick before its unvisited
    /// remainder is demoted.
    pub job_allotment: f64,
    /// Seconds a whole tick may run before the remaining levels are skipped.
    pub tick_budget: f64,
    /// Number of priority levels. Index 0 is serviced first.
    pub levels: usize,
    /// If set, every this many ticks all entities are moved back to level 0.
    /// Unset by default: demotion is permanent until re-registration.
    pub priority_reset_interval: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            job_allotment: 0.0,
            tick_budget: 0.0,
            levels: DEFAULT_LEVELS,
            priority_reset_interval: None,
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every field. Negative durations are accepted (they read as
    /// zero); non-finite ones are not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("job_allotment", self.job_allotment),
            ("tick_budget", self.tick_budget),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        if self.levels == 0 || self.levels > MAX_LEVELS {
            return Err(ConfigError::InvalidLevels {
                levels: self.levels,
            });
        }
        if self.priority_reset_interval == Some(0) {
            return Err(ConfigError::ZeroResetInterval);
        }
        Ok(())
    }

    /// Per-group allotment.
    pub fn job_allotment(&self) -> Duration {
        seconds(self.job_allotment)
    }

    /// Whole-tick budget.
    pub fn tick_budget(&self) -> Duration {
        seconds(self.tick_budget)
    }

    /// Level count clamped to `1..=MAX_LEVELS`.
    pub fn level_count(&self) -> usize {
        self.levels.clamp(1, MAX_LEVELS)
    }
}

fn seconds(value: f64) -> Duration {
    // `f64::max` discards NaN, so NaN reads as zero.
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
