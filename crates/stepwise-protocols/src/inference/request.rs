//! Inference request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ExecutionState, SessionEvent, WorkflowStep};

/// Everything the inference component sees for one attempt.
///
/// Built from the current instruction and the compacted context only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub run_id: String,
    pub step_index: usize,
    pub total_steps: usize,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub flags: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub context: Vec<SessionEvent>,
    /// Attempt number within the step, starting at 1.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_secs")]
    pub timeout: Option<Duration>,
}

impl InferenceRequest {
    /// Request for one step, carrying a read-only view of the state.
    pub fn for_step(
        run_id: impl Into<String>,
        step: &WorkflowStep,
        total_steps: usize,
        state: &ExecutionState,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            step_index: step.index,
            total_steps,
            instruction: step.instruction.clone(),
            system: None,
            flags: state.flags.clone(),
            last_error: state.last_error.clone(),
            context: Vec::new(),
            attempt: 1,
            timeout: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_context(mut self, context: Vec<SessionEvent>) -> Self {
        self.context = context;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Total payload bytes carried in the context.
    pub fn context_bytes(&self) -> usize {
        self.context.iter().map(|e| e.payload.len()).sum()
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
