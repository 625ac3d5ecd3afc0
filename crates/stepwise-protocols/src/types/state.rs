//! Execution state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Progress of one workflow run.
///
/// `step_pointer` is the index of the next step to execute; it only moves
/// forward, one step at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub step_pointer: usize,
    #[serde(default)]
    pub flags: Map<String, Value>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl ExecutionState {
    pub fn is_complete(&self, total_steps: usize) -> bool {
        self.step_pointer >= total_steps
    }

    /// Merge a partial update. Flags are last-write-wins per key.
    pub fn apply(&mut self, update: &StateUpdate) {
        for (key, value) in &update.flags {
            self.flags.insert(key.clone(), value.clone());
        }
        if let Some(last_error) = &update.last_error {
            self.last_error = last_error.clone();
        }
    }
}

/// Partial update merged into [`ExecutionState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub flags: Map<String, Value>,
    /// `None` leaves the error untouched, `Some(None)` clears it.
    pub last_error: Option<Option<String>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    pub fn flags(mut self, flags: Map<String, Value>) -> Self {
        self.flags.extend(flags);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.last_error.is_none()
    }
}
