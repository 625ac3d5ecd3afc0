//! Classification of inference responses.

use regex::Regex;
use serde_json::{Map, Value};

use stepwise_config::DEFAULT_SENTINEL;
use stepwise_protocols::inference::InferenceResponse;
use stepwise_protocols::types::StepVerdict;

const NO_DETAIL: &str = "inference reported failure without detail";

/// Decides what a response means for the current step.
#[derive(Debug, Clone)]
pub struct Interpreter {
    sentinel: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}

impl Interpreter {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// The sentinel marker wins over the success flag.
    pub fn classify(&self, response: &InferenceResponse) -> StepVerdict {
        if response.output_text.contains(&self.sentinel) {
            return StepVerdict::AlreadyDone;
        }
        if response.is_success {
            return StepVerdict::Success;
        }
        let reason = response.output_text.trim();
        StepVerdict::Failed(if reason.is_empty() {
            NO_DETAIL.to_string()
        } else {
            reason.to_string()
        })
    }
}

/// Flags reported in a fenced `json` block of the model output.
///
/// Looks for the first block whose object has a `"flags"` object.
pub fn extract_flags(output: &str) -> Option<Map<String, Value>> {
    let re = Regex::new(r"(?s)```json\s*(.*?)```").ok()?;
    re.captures_iter(output).find_map(|cap| {
        let value: Value = serde_json::from_str(cap[1].trim()).ok()?;
        match value {
            Value::Object(mut object) => match object.remove("flags") {
                Some(Value::Object(flags)) => Some(flags),
                _ => None,
            },
            _ => None,
        }
    })
}

/// String form of a flag value for tagging session events.
pub fn flag_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
