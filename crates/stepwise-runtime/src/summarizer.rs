//! Summarization of evicted session history.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use stepwise_protocols::error::InferenceError;
use stepwise_protocols::inference::{InferenceProvider, InferenceRequest};
use stepwise_protocols::types::{ExecutionState, Payload, SessionEvent, WorkflowStep};

use crate::retry::{RetryError, RetryPolicy};

/// Turns a run of old events into one short text.
///
/// Implementations must keep every tagged variable value and every recorded
/// error verbatim; the compactor re-checks and appends whatever is missing.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, events: &[SessionEvent]) -> Result<String, InferenceError>;
}

/// Key under which a recorded error is carried as a fact.
pub(crate) fn error_key(sequence: u64) -> String {
    format!("error@{}", sequence)
}

/// Tagged variables and recorded errors of `events`, later values winning.
pub(crate) fn preserved_facts(events: &[SessionEvent]) -> BTreeMap<String, String> {
    let mut facts = BTreeMap::new();
    for event in events {
        for (key, value) in &event.variables {
            facts.insert(key.clone(), value.clone());
        }
        if let Some(error) = &event.error {
            facts.insert(error_key(event.sequence), error.clone());
        }
    }
    facts
}

pub(crate) fn render_facts<'a>(facts: impl IntoIterator<Item = (&'a String, &'a String)>) -> String {
    let mut out = String::from("Preserved facts:");
    for (key, value) in facts {
        out.push_str(&format!("\n- {}: {}", key, value));
    }
    out
}

/// Deterministic summarizer that keeps only the preserved facts.
#[derive(Debug, Default, Clone, Copy)]
pub struct FactSummarizer;

#[async_trait]
impl Summarizer for FactSummarizer {
    async fn summarize(&self, events: &[SessionEvent]) -> Result<String, InferenceError> {
        let facts = preserved_facts(events);
        let header = format!("{} earlier events compacted.", events.len());
        if facts.is_empty() {
            return Ok(header);
        }
        Ok(format!("{}\n{}", header, render_facts(&facts)))
    }
}

const SUMMARY_SYSTEM: &str = "You compress the history of an automated procedure. \
Write a short factual summary of what was attempted and what happened. \
Copy every tagged value and every error message exactly as written. \
Do not speculate about next steps.";

/// Summarizer backed by the inference component.
pub struct LlmSummarizer {
    provider: Arc<dyn InferenceProvider>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop retrying once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn build_transcript(events: &[SessionEvent]) -> String {
        let mut transcript = String::new();
        for event in events {
            let body = match &event.payload {
                Payload::Empty => String::new(),
                Payload::Text(text) => text.clone(),
                Payload::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            };
            transcript.push_str(&format!("[{}] {}: {}", event.sequence, event.kind.label(), body));
            if let Some(error) = &event.error {
                transcript.push_str(&format!(" (error: {})", error));
            }
            for (key, value) in &event.variables {
                transcript.push_str(&format!(" [{}={}]", key, value));
            }
            transcript.push('\n');
        }
        transcript
    }

    fn build_request(&self, events: &[SessionEvent]) -> InferenceRequest {
        let step = WorkflowStep {
            index: 0,
            instruction: format!(
                "Summarize this history:\n\n{}",
                Self::build_transcript(events)
            ),
        };
        InferenceRequest::for_step("compaction", &step, 0, &ExecutionState::default())
            .with_system(SUMMARY_SYSTEM)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, events: &[SessionEvent]) -> Result<String, InferenceError> {
        if events.is_empty() {
            return Ok(String::new());
        }
        debug!("Summarizing {} events with {}", events.len(), self.provider.id());

        let request = self.build_request(events);
        let result = self
            .retry
            .run(&self.cancel, |attempt| {
                let request = request.clone().with_attempt(attempt);
                let provider = self.provider.clone();
                async move { provider.invoke(request).await }
            })
            .await;

        let response = match result {
            Ok((response, _)) => response,
            Err(RetryError::Exhausted { last, .. }) => return Err(last),
            Err(RetryError::Permanent { error, .. }) => return Err(error),
            Err(RetryError::Cancelled { .. }) => {
                return Err(InferenceError::Network("summarization cancelled".to_string()));
            }
        };

        if !response.is_success {
            return Err(InferenceError::InvalidResponse(format!(
                "summarizer declined: {}",
                response.output_text.trim()
            )));
        }
        Ok(response.output_text.trim().to_string())
    }
}

#[cfg(test)]
#[path = "summarizer_tests.rs"]
mod tests;
