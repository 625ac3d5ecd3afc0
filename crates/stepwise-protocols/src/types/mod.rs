//! Core data model.

mod breaker;
mod event;
mod state;
mod verdict;
mod workflow;

pub use breaker::{BreakerState, CircuitBreakerState};
pub use event::{check_order, EventKind, Payload, SessionEvent, SessionLog};
pub use state::{ExecutionState, StateUpdate};
pub use verdict::StepVerdict;
pub use workflow::{Workflow, WorkflowStep};
