//! Step classification result.

use serde::{Deserialize, Serialize};

/// Outcome of interpreting one inference response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum StepVerdict {
    /// The step was performed and confirmed.
    Success,
    /// The sentinel marker reported the step as already satisfied.
    AlreadyDone,
    /// The step was not confirmed.
    Failed(String),
}

impl StepVerdict {
    /// Whether the step pointer may advance past this step.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyDone)
    }
}
