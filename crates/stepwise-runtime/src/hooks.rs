//! Invocation hooks.

use tracing::{debug, info, warn};

use stepwise_protocols::error::InferenceError;
use stepwise_protocols::inference::{InferenceRequest, InferenceResponse};

/// Fixed interception points around one inference call.
pub trait InvokeHook {
    fn before_invoke(&self, request: InferenceRequest) -> InferenceRequest;

    fn on_result(&self, response: InferenceResponse) -> InferenceResponse;

    /// Optionally recover from an error by producing a response.
    fn on_error(&self, error: &InferenceError) -> Option<InferenceResponse>;
}

/// Built-in hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    /// Log every request, result and error.
    Trace,
    /// Drop the oldest context events until the payload fits. Summaries and
    /// events carrying variables or errors are never dropped.
    ContextBudget { max_bytes: usize },
    /// Turn non-transient inference errors into failed responses so the step
    /// is retried instead of aborting the run.
    FailSoft,
}

impl InvokeHook for Hook {
    fn before_invoke(&self, mut request: InferenceRequest) -> InferenceRequest {
        match self {
            Self::Trace => {
                info!(
                    run_id = %request.run_id,
                    step = request.step_index,
                    attempt = request.attempt,
                    context_events = request.context.len(),
                    "Invoking inference"
                );
                request
            }
            Self::ContextBudget { max_bytes } => {
                let before = request.context.len();
                let mut bytes = request.context_bytes();
                let mut dropped = vec![false; before];
                for (i, event) in request.context.iter().enumerate() {
                    if bytes <= *max_bytes {
                        break;
                    }
                    if event.carries_facts() {
                        continue;
                    }
                    bytes -= event.payload.len();
                    dropped[i] = true;
                }
                let mut index = 0;
                request.context.retain(|_| {
                    index += 1;
                    !dropped[index - 1]
                });
                if request.context.len() < before {
                    debug!(
                        "Context budget dropped {} of {} events",
                        before - request.context.len(),
                        before
                    );
                }
                request
            }
            Self::FailSoft => request,
        }
    }

    fn on_result(&self, response: InferenceResponse) -> InferenceResponse {
        if let Self::Trace = self {
            info!(
                success = response.is_success,
                artifacts = response.artifacts.len(),
                "Inference returned"
            );
        }
        response
    }

    fn on_error(&self, error: &InferenceError) -> Option<InferenceResponse> {
        match self {
            Self::Trace => {
                warn!(transient = error.is_transient(), "Inference failed: {}", error);
                None
            }
            Self::ContextBudget { .. } => None,
            Self::FailSoft if !error.is_transient() => {
                Some(InferenceResponse::failure(format!("Inference failed: {}", error)))
            }
            Self::FailSoft => None,
        }
    }
}

/// Hooks applied in order.
#[derive(Debug, Clone, Default)]
pub struct HookChain {
    hooks: Vec<Hook>,
}

impl HookChain {
    pub fn new(hooks: Vec<Hook>) -> Self {
        Self { hooks }
    }

    pub fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }
}

impl InvokeHook for HookChain {
    fn before_invoke(&self, request: InferenceRequest) -> InferenceRequest {
        self.hooks
            .iter()
            .fold(request, |request, hook| hook.before_invoke(request))
    }

    fn on_result(&self, response: InferenceResponse) -> InferenceResponse {
        self.hooks
            .iter()
            .fold(response, |response, hook| hook.on_result(response))
    }

    /// Every hook sees the error; the first recovery wins.
    fn on_error(&self, error: &InferenceError) -> Option<InferenceResponse> {
        let mut recovered = None;
        for hook in &self.hooks {
            let response = hook.on_error(error);
            if recovered.is_none() {
                recovered = response;
            }
        }
        recovered
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
