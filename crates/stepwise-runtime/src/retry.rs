//! Retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stepwise_config::{RetryConfig, RunnerConfig};
use stepwise_protocols::error::{InferenceError, StepError};

/// Errors a [`RetryPolicy`] knows how to judge.
pub trait Retryable: std::fmt::Display {
    /// Whether another attempt can reasonably succeed.
    fn is_transient(&self) -> bool;

    /// Delay requested by the failing side, overriding the backoff.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for InferenceError {
    fn is_transient(&self) -> bool {
        InferenceError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_seconds } => {
                Some(Duration::from_secs(*retry_after_seconds))
            }
            _ => None,
        }
    }
}

impl Retryable for StepError {
    fn is_transient(&self) -> bool {
        StepError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after_seconds().map(Duration::from_secs)
    }
}

/// Exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Add up to ±10% jitter.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Backoff {
    /// No waiting at all.
    pub fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay after the failure of zero-based attempt `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = delay.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.jitter {
            let jitter = rand_jitter(delay * 0.1);
            (delay + jitter).max(0.0) as u64
        } else {
            delay as u64
        };

        Duration::from_millis(delay_ms)
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

/// Simple jitter using system time.
fn rand_jitter(max: f64) -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos as f64 / 1_000_000_000.0) * max * 2.0 - max
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; holds the last error unchanged.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error ended the loop early.
    Permanent { attempts: u32, error: E },
    /// Cancelled while waiting between attempts.
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Permanent { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// Bounded number of attempts with backoff in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(runner: &RunnerConfig, retry: &RetryConfig) -> Self {
        Self::new(runner.max_attempts, Backoff::from(retry))
    }

    /// Delay before the next attempt, or `None` if `error` after the
    /// one-based `attempt` ends the loop.
    pub fn delay_before_retry<E: Retryable>(&self, attempt: u32, error: &E) -> Option<Duration> {
        if !error.is_transient() || attempt >= self.max_attempts {
            return None;
        }
        Some(
            error
                .retry_after()
                .unwrap_or_else(|| self.backoff.delay_for_attempt(attempt.saturating_sub(1))),
        )
    }

    /// Call `operation` with the one-based attempt number until it succeeds,
    /// fails permanently, or runs out of attempts.
    ///
    /// Returns the value and the number of attempts it took.
    pub async fn run<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match operation(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(e) => e,
            };

            if !error.is_transient() {
                debug!("Non-retryable error on attempt {}: {}", attempt, error);
                return Err(RetryError::Permanent {
                    attempts: attempt,
                    error,
                });
            }

            let Some(delay) = self.delay_before_retry(attempt, &error) else {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            };

            warn!(
                "Attempt {}/{} failed: {}, retrying in {:?}",
                attempt, self.max_attempts, error, delay
            );
            if !wait(delay, cancel).await {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
        }
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
pub async fn wait(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
