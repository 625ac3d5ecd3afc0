//! Shared test doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use stepwise_protocols::error::InferenceError;
use stepwise_protocols::inference::{InferenceProvider, InferenceRequest, InferenceResponse};

/// Provider whose answer depends on the instruction and how often it was
/// asked about it.
pub struct ScriptedProvider {
    /// Failures to return per instruction before succeeding.
    failures: HashMap<String, u32>,
    /// Instructions answered with the sentinel marker.
    satisfied: Vec<String>,
    sentinel: String,
    seen: Mutex<HashMap<String, u32>>,
    total: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(sentinel: &str) -> Self {
        Self {
            failures: HashMap::new(),
            satisfied: Vec::new(),
            sentinel: sentinel.to_string(),
            seen: Mutex::new(HashMap::new()),
            total: AtomicU32::new(0),
        }
    }

    pub fn failing(mut self, instruction: &str, times: u32) -> Self {
        self.failures.insert(instruction.to_string(), times);
        self
    }

    pub fn satisfied(mut self, instruction: &str) -> Self {
        self.satisfied.push(instruction.to_string());
        self
    }

    pub fn calls_for(&self, instruction: &str) -> u32 {
        self.seen.lock().get(instruction).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let count = {
            let mut seen = self.seen.lock();
            let count = seen.entry(request.instruction.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if self.satisfied.contains(&request.instruction) {
            return Ok(InferenceResponse::failure(format!(
                "Nothing to do. {}",
                self.sentinel
            )));
        }
        let failures = self.failures.get(&request.instruction).copied().unwrap_or(0);
        if count <= failures {
            return Ok(InferenceResponse::failure(format!(
                "{} failed on attempt {}",
                request.instruction, count
            )));
        }
        Ok(InferenceResponse::success(format!("{} done", request.instruction)))
    }
}
