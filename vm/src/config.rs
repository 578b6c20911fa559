use serde::{Deserialize, Serialize};

/// Runtime tuning knobs. Every field has a default, so a partial TOML table
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Collect between every step instead of waiting for the threshold.
    pub stress_gc: bool,
    /// Heap size (bytes) that triggers the first collection.
    pub gc_threshold: usize,
    /// Maximum running stack depth per thread.
    pub max_depth: usize,
    /// Steps a thread runs before the scheduler moves on.
    pub time_slice: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stress_gc: false,
            gc_threshold: 1024 * 1024,
            max_depth: 10_000,
            time_slice: 1024,
        }
    }
}

impl VmConfig {
    /// Steps per slice actually used by the scheduler.
    pub fn effective_slice(&self) -> usize {
        if self.stress_gc {
            1
        } else {
            self.time_slice.max(1)
        }
    }
}
