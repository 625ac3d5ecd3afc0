//! Workflow definition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One instruction of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub index: usize,
    pub instruction: String,
}

/// Immutable ordered sequence of instructions.
///
/// Cloning is cheap; all clones share the same step slice.
#[derive(Debug, Clone)]
pub struct Workflow {
    steps: Arc<[WorkflowStep]>,
    fingerprint: String,
}

impl Workflow {
    /// Build a workflow from instructions in execution order.
    pub fn new<I, S>(instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<WorkflowStep> = instructions
            .into_iter()
            .enumerate()
            .map(|(index, instruction)| WorkflowStep {
                index,
                instruction: instruction.into(),
            })
            .collect();
        let fingerprint = fingerprint(&steps);

        Self {
            steps: steps.into(),
            fingerprint,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&WorkflowStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// SHA-256 over the instruction list, used to detect resuming against a
    /// different workflow.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn fingerprint(steps: &[WorkflowStep]) -> String {
    let mut hasher = Sha256::new();
    for step in steps {
        // Length prefix keeps ["ab", "c"] and ["a", "bc"] apart.
        hasher.update((step.instruction.len() as u64).to_le_bytes());
        hasher.update(step.instruction.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
