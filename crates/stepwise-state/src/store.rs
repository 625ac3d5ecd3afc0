//! State store trait and in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use stepwise_protocols::error::StateError;
use stepwise_protocols::types::{ExecutionState, StateUpdate};

/// Durable record of the step pointer and auxiliary state.
///
/// Only the step runner mutates a store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Number of steps in the workflow this store tracks.
    fn total_steps(&self) -> usize;

    /// Snapshot of the current state. Never a live reference.
    async fn get(&self) -> ExecutionState;

    /// Move the pointer forward by exactly one step.
    async fn advance(&self) -> Result<ExecutionState, StateError>;

    /// Merge flags and set or clear the last error.
    async fn update(&self, update: StateUpdate) -> Result<ExecutionState, StateError>;

    /// Return to the initial state.
    async fn reset(&self) -> Result<(), StateError>;
}

/// Validate and apply an advance to a state value.
pub(crate) fn advance_state(
    state: &mut ExecutionState,
    total_steps: usize,
) -> Result<(), StateError> {
    if state.step_pointer >= total_steps {
        return Err(StateError::InvalidTransition {
            pointer: state.step_pointer,
            total: total_steps,
        });
    }
    state.step_pointer += 1;
    Ok(())
}

/// In-memory state store.
pub struct MemoryStateStore {
    state: RwLock<ExecutionState>,
    total_steps: usize,
}

impl MemoryStateStore {
    pub fn new(total_steps: usize) -> Self {
        Self::with_state(total_steps, ExecutionState::default())
    }

    /// Start from an existing state, e.g. one restored elsewhere.
    pub fn with_state(total_steps: usize, state: ExecutionState) -> Self {
        Self {
            state: RwLock::new(state),
            total_steps,
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn total_steps(&self) -> usize {
        self.total_steps
    }

    async fn get(&self) -> ExecutionState {
        self.state.read().clone()
    }

    async fn advance(&self) -> Result<ExecutionState, StateError> {
        let mut state = self.state.write();
        advance_state(&mut state, self.total_steps)?;
        debug!("Advanced step pointer to {}", state.step_pointer);
        Ok(state.clone())
    }

    async fn update(&self, update: StateUpdate) -> Result<ExecutionState, StateError> {
        let mut state = self.state.write();
        state.apply(&update);
        Ok(state.clone())
    }

    async fn reset(&self) -> Result<(), StateError> {
        *self.state.write() = ExecutionState::default();
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
