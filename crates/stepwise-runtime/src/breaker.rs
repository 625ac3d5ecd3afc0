//! Circuit breaker around the inference call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use stepwise_config::{BreakerConfig, HalfOpenMode};
use stepwise_protocols::error::StepError;
use stepwise_protocols::types::{BreakerState, CircuitBreakerState};

use crate::clock::{Clock, SystemClock};

/// What happens on the first `allow()` after the recovery timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HalfOpenPolicy {
    /// Close immediately and let every caller through.
    #[default]
    Optimistic,
    /// Let exactly one trial call through; its outcome decides.
    Probe,
}

impl From<HalfOpenMode> for HalfOpenPolicy {
    fn from(mode: HalfOpenMode) -> Self {
        match mode {
            HalfOpenMode::Optimistic => Self::Optimistic,
            HalfOpenMode::Probe => Self::Probe,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open: HalfOpenPolicy,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 4,
            recovery_timeout: Duration::from_secs(90),
            half_open: HalfOpenPolicy::Optimistic,
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_secs),
            half_open: config.half_open.into(),
        }
    }
}

/// Stops calling a failing inference component until it had time to recover.
///
/// Cheap to share behind an [`Arc`]; all state sits behind one mutex so
/// concurrent runs see consistent transitions.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<CircuitBreakerState>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            state: Mutex::new(CircuitBreakerState::default()),
        }
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Check whether a call may proceed.
    ///
    /// Rejections carry the remaining wait; the guarded call must not run.
    pub fn allow(&self) -> Result<(), StepError> {
        let mut state = self.state.lock();
        match state.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => {
                debug!("Circuit breaker probe in flight, rejecting call");
                Err(StepError::BreakerOpen { retry_in_secs: 1 })
            }
            BreakerState::Open => {
                let timeout = TimeDelta::milliseconds(
                    self.settings.recovery_timeout.as_millis().min(i64::MAX as u128) as i64,
                );
                let elapsed = state
                    .last_failure_at
                    .map(|at| self.clock.now() - at)
                    .unwrap_or(TimeDelta::MAX);

                if elapsed <= timeout {
                    let remaining_ms = (timeout - elapsed).num_milliseconds().max(0) as u64;
                    let retry_in_secs = remaining_ms.div_ceil(1000).max(1);
                    return Err(StepError::BreakerOpen { retry_in_secs });
                }

                match self.settings.half_open {
                    HalfOpenPolicy::Optimistic => {
                        info!("Circuit breaker recovery timeout elapsed, closing");
                        *state = CircuitBreakerState::default();
                    }
                    HalfOpenPolicy::Probe => {
                        info!("Circuit breaker recovery timeout elapsed, allowing one probe");
                        state.state = BreakerState::HalfOpen;
                    }
                }
                Ok(())
            }
        }
    }

    /// Record a successful call.
    pub fn success(&self) {
        let mut state = self.state.lock();
        if state.state != BreakerState::Closed {
            info!("Circuit breaker closed after successful call");
        }
        *state = CircuitBreakerState::default();
    }

    /// Record a failed call.
    pub fn failure(&self) {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(self.clock.now());

        let trips = state.state == BreakerState::HalfOpen
            || state.failure_count >= self.settings.failure_threshold;
        if trips && state.state != BreakerState::Open {
            warn!(
                "Circuit breaker opened after {} consecutive failures",
                state.failure_count
            );
        }
        if trips {
            state.state = BreakerState::Open;
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        self.state.lock().clone()
    }

    /// Run `call` if the breaker allows it and record its outcome.
    pub async fn call<F, Fut, T, E>(&self, call: F) -> Result<T, StepError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<StepError>,
    {
        self.allow()?;
        match call().await {
            Ok(value) => {
                self.success();
                Ok(value)
            }
            Err(err) => {
                self.failure();
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
