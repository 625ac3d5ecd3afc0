//! Run-level errors surfaced by the step runner.

use thiserror::Error;

use super::{InferenceError, SessionStoreError, StateError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Workflow exhausted at step {step_index} ({instruction:?}) after {attempts} attempts: {last_error}")]
    WorkflowExhausted {
        step_index: usize,
        instruction: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Session log holds {live} live artifacts of sub-kind {sub_kind:?}")]
    MissingArtifact { sub_kind: String, live: usize },

    #[error("Run cancelled before step {step_index}")]
    Cancelled { step_index: usize },

    #[error("Inference error: {0}")]
    Inference(InferenceError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),
}

impl RunError {
    /// Step index the run stopped at, when the error is tied to one.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Self::WorkflowExhausted { step_index, .. } | Self::Cancelled { step_index } => {
                Some(*step_index)
            }
            _ => None,
        }
    }
}
