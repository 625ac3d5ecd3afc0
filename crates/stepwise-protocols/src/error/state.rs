//! State store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid transition: pointer {pointer} has no pending step (workflow has {total} steps)")]
    InvalidTransition { pointer: usize, total: usize },

    #[error("Persisted state belongs to a different workflow (expected {expected}, found {found})")]
    WorkflowMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
