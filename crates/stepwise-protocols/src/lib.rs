//! # Stepwise Protocols
//!
//! Shared data model, error taxonomy and the inference contract consumed by
//! the step runner. Nothing in here performs I/O.

pub mod error;
pub mod inference;
pub mod types;

pub use error::{
    InferenceError, RunError, SessionStoreError, StateError, StepError,
};
pub use inference::{Artifact, InferenceProvider, InferenceRequest, InferenceResponse};
pub use types::{
    BreakerState, CircuitBreakerState, EventKind, ExecutionState, Payload, SessionEvent,
    SessionLog, StateUpdate, StepVerdict, Workflow, WorkflowStep,
};
