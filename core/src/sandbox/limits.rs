use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unset keys take the testcase defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub max_wall_time_ms: u64,
    pub max_memory_bytes: u64,
}

/// Per-problem overrides of [`Limits`]; unset fields keep the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsOverride {
    pub max_wall_time_ms: Option<u64>,
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    pub const DEFAULT_WALL_TIME_MS: u64 = 2000;
    pub const DEFAULT_MEMORY_BYTES: u64 = 256 * 1024 * 1024;

    pub fn new(wall_time: Duration, memory_bytes: u64) -> Self {
        Self {
            max_wall_time_ms: wall_time.as_millis().try_into().unwrap_or(u64::MAX),
            max_memory_bytes: memory_bytes,
        }
    }

    pub fn wall_time(&self) -> Duration {
        Duration::from_millis(self.max_wall_time_ms)
    }

    /// Whole CPU seconds allowed before the kernel steps in; the wall clock normally fires first.
    pub fn cpu_seconds_backstop(&self) -> u64 {
        self.max_wall_time_ms / 1000 + 2
    }

    pub fn with_override(mut self, o: &LimitsOverride) -> Self {
        if let Some(ms) = o.max_wall_time_ms {
            self.max_wall_time_ms = ms;
        }
        if let Some(bytes) = o.max_memory_bytes {
            self.max_memory_bytes = bytes;
        }
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_wall_time_ms: Self::DEFAULT_WALL_TIME_MS,
            max_memory_bytes: Self::DEFAULT_MEMORY_BYTES,
        }
    }
}
