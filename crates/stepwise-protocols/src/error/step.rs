//! Per-attempt step errors.

use thiserror::Error;

use super::InferenceError;

/// Why a single invocation attempt for a step did not succeed.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// Retryable failure of the inference call itself.
    #[error("Transient execution error: {0}")]
    Transient(InferenceError),

    /// The circuit breaker rejected the call; it was never attempted.
    #[error("Circuit breaker open: retry in {retry_in_secs} seconds")]
    BreakerOpen { retry_in_secs: u64 },

    /// The inference component answered but did not confirm the step.
    #[error("Step failed: {0}")]
    Failed(String),

    /// Non-retryable inference failure.
    #[error("Fatal inference error: {0}")]
    Fatal(InferenceError),
}

impl StepError {
    /// Every kind of attempt failure except `Fatal` is worth another attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    /// Delay the inference component asked for, if any.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Transient(InferenceError::RateLimited { retry_after_seconds }) => {
                Some(*retry_after_seconds)
            }
            _ => None,
        }
    }
}

impl From<InferenceError> for StepError {
    fn from(err: InferenceError) -> Self {
        if err.is_transient() {
            Self::Transient(err)
        } else {
            Self::Fatal(err)
        }
    }
}
