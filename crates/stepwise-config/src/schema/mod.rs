//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

mod schema_resilience;
mod schema_storage;

pub use schema_resilience::*;
pub use schema_storage::*;

/// Marker the inference component emits when a step is already satisfied.
pub const DEFAULT_SENTINEL: &str = "[[STEP_ALREADY_SATISFIED]]";

pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub compaction: CompactionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Step runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Total invocation attempts per step.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Compact after every N completed steps.
    #[serde(default = "default_compaction_interval")]
    pub compaction_interval: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            step_timeout_secs: default_step_timeout(),
            sentinel: default_sentinel(),
            compaction_interval: default_compaction_interval(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_step_timeout() -> u64 {
    120
}

fn default_sentinel() -> String {
    DEFAULT_SENTINEL.to_string()
}

fn default_compaction_interval() -> u32 {
    1
}

/// How evicted history is handled during compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    Drop,
    #[default]
    Summarize,
}

/// Context compaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Recent non-artifact events kept intact.
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default)]
    pub eviction: EvictionMode,

    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            eviction: EvictionMode::default(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

fn default_window() -> usize {
    8
}

fn default_summary_max_chars() -> usize {
    2000
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
