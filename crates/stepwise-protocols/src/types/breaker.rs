//! Circuit breaker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    /// A single trial call is in flight (probe-gated recovery only).
    HalfOpen,
}

/// Snapshot of a circuit breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub state: BreakerState,
}
