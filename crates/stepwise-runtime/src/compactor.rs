//! Context compaction.
//!
//! Keeps the session log small enough to ship with every request:
//!
//! - only the newest artifact of each sub-kind keeps its payload; older ones
//!   become tombstones;
//! - the last `window` conversational events stay intact;
//! - anything older is dropped or folded into a single summary event.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use stepwise_config::{CompactionConfig, EvictionMode};
use stepwise_protocols::error::RunError;
use stepwise_protocols::types::{EventKind, SessionEvent, SessionLog};

use crate::summarizer::{preserved_facts, render_facts, FactSummarizer, Summarizer};

/// What happens to conversational events that fall out of the window.
#[derive(Clone)]
pub enum EvictionPolicy {
    Drop,
    Summarize(Arc<dyn Summarizer>),
}

impl EvictionPolicy {
    /// Policy for `mode`, using `summarizer` when summarizing.
    pub fn from_mode(mode: EvictionMode, summarizer: Arc<dyn Summarizer>) -> Self {
        match mode {
            EvictionMode::Drop => Self::Drop,
            EvictionMode::Summarize => Self::Summarize(summarizer),
        }
    }
}

impl std::fmt::Debug for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => f.write_str("Drop"),
            Self::Summarize(_) => f.write_str("Summarize"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub tombstoned: usize,
    pub evicted: usize,
    pub summarized: bool,
}

impl CompactionReport {
    pub fn is_noop(&self) -> bool {
        self.tombstoned == 0 && self.evicted == 0
    }
}

#[derive(Debug, Clone)]
pub struct Compactor {
    window: usize,
    eviction: EvictionPolicy,
    summary_max_chars: usize,
}

impl Compactor {
    pub fn new(window: usize, eviction: EvictionPolicy) -> Self {
        Self {
            window,
            eviction,
            summary_max_chars: 2000,
        }
    }

    pub fn from_config(config: &CompactionConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self::new(config.window, EvictionPolicy::from_mode(config.eviction, summarizer))
            .with_summary_max_chars(config.summary_max_chars)
    }

    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Compact a snapshot of the log.
    ///
    /// Running this on its own output changes nothing.
    pub async fn compact(
        &self,
        mut events: Vec<SessionEvent>,
    ) -> (Vec<SessionEvent>, CompactionReport) {
        let mut report = CompactionReport {
            tombstoned: tombstone_stale_artifacts(&mut events),
            ..Default::default()
        };

        let conversational: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.kind.is_artifact() && !e.summary)
            .map(|(i, _)| i)
            .collect();
        let evict_count = conversational.len().saturating_sub(self.window);
        if evict_count == 0 {
            debug!("Compaction: {} tombstoned, nothing to evict", report.tombstoned);
            return (events, report);
        }

        let evict: HashSet<usize> = conversational[..evict_count].iter().copied().collect();
        report.evicted = evict_count;

        let summary = match &self.eviction {
            EvictionPolicy::Drop => None,
            EvictionPolicy::Summarize(summarizer) => {
                let inputs: Vec<SessionEvent> = events
                    .iter()
                    .enumerate()
                    .filter(|(i, e)| evict.contains(i) || e.summary)
                    .map(|(_, e)| e.clone())
                    .collect();
                report.summarized = true;
                Some(self.summarize(summarizer.as_ref(), &inputs).await)
            }
        };

        let mut compacted: Vec<SessionEvent> = events
            .into_iter()
            .enumerate()
            .filter(|(i, e)| !evict.contains(i) && !(summary.is_some() && e.summary))
            .map(|(_, e)| e)
            .collect();
        if let Some(summary) = summary {
            let position = compacted
                .iter()
                .position(|e| e.sequence > summary.sequence)
                .unwrap_or(compacted.len());
            compacted.insert(position, summary);
        }

        info!(
            "Compacted session log: {} tombstoned, {} evicted{}",
            report.tombstoned,
            report.evicted,
            if report.summarized { " into summary" } else { "" }
        );
        (compacted, report)
    }

    /// Build the summary event replacing `inputs`.
    ///
    /// `inputs` holds the evicted events plus any previous summary.
    async fn summarize(&self, summarizer: &dyn Summarizer, inputs: &[SessionEvent]) -> SessionEvent {
        let facts = preserved_facts(inputs);
        let sequence = inputs
            .iter()
            .filter(|e| !e.summary)
            .map(|e| e.sequence)
            .max()
            .unwrap_or_default();

        let text = match summarizer.summarize(inputs).await {
            Ok(text) => truncate_chars(&text, self.summary_max_chars),
            Err(err) => {
                warn!("Summarizer failed, keeping facts only: {}", err);
                FactSummarizer
                    .summarize(inputs)
                    .await
                    .unwrap_or_default()
            }
        };
        let text = with_missing_facts(text, &facts);

        let mut event = SessionEvent::new(sequence, EventKind::System, text);
        event.variables = facts;
        event.summary = true;
        event
    }

    /// Fail if any sub-kind has more than one live artifact.
    pub fn verify(events: &[SessionEvent]) -> Result<(), RunError> {
        let mut live: HashMap<&str, usize> = HashMap::new();
        for event in events.iter().filter(|e| e.is_live_artifact()) {
            if let Some(sub_kind) = event.kind.artifact_sub_kind() {
                *live.entry(sub_kind).or_default() += 1;
            }
        }
        match live.into_iter().find(|(_, count)| *count > 1) {
            Some((sub_kind, count)) => Err(RunError::MissingArtifact {
                sub_kind: sub_kind.to_string(),
                live: count,
            }),
            None => Ok(()),
        }
    }

    /// The events a request gets to see.
    pub fn context_view(events: &[SessionEvent]) -> Vec<SessionEvent> {
        events.iter().filter(|e| !e.tombstoned).cloned().collect()
    }

    /// Bounded context for one request.
    ///
    /// Like [`Compactor::context_view`], but only the newest `window` plain
    /// conversational events are kept. Summaries, live artifacts and events
    /// carrying variables or errors always stay.
    pub fn request_view(&self, events: &[SessionEvent]) -> Vec<SessionEvent> {
        let droppable = |e: &SessionEvent| {
            !e.kind.is_artifact() && !e.carries_facts()
        };
        let plain = events.iter().filter(|e| !e.tombstoned && droppable(*e)).count();
        let mut skip = plain.saturating_sub(self.window);
        events
            .iter()
            .filter(|e| !e.tombstoned)
            .filter(|e| {
                if skip > 0 && droppable(*e) {
                    skip -= 1;
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    /// Tombstone shadowed artifacts in a live log, leaving everything else
    /// as it is. Returns how many events were tombstoned.
    pub fn tombstone_stale(log: &mut SessionLog) -> usize {
        stale_artifact_sequences(log.events())
            .into_iter()
            .filter(|sequence| log.tombstone(*sequence))
            .count()
    }
}

/// Sequences of live artifacts shadowed by a newer one of the same sub-kind.
fn stale_artifact_sequences(events: &[SessionEvent]) -> Vec<u64> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stale = Vec::new();
    for event in events.iter().rev() {
        let Some(sub_kind) = event.kind.artifact_sub_kind() else {
            continue;
        };
        if !seen.insert(sub_kind) && !event.tombstoned {
            stale.push(event.sequence);
        }
    }
    stale
}

/// Tombstone every artifact shadowed by a newer one of the same sub-kind.
fn tombstone_stale_artifacts(events: &mut [SessionEvent]) -> usize {
    let stale: HashSet<u64> = stale_artifact_sequences(events).into_iter().collect();
    events
        .iter_mut()
        .filter(|e| stale.contains(&e.sequence))
        .map(|e| e.tombstone())
        .filter(|tombstoned| *tombstoned)
        .count()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Append a facts block for every value the text lost.
fn with_missing_facts(text: String, facts: &BTreeMap<String, String>) -> String {
    let missing: Vec<(&String, &String)> = facts
        .iter()
        .filter(|(key, value)| !text.contains(&format!("{}: {}", key, value)))
        .collect();
    if missing.is_empty() {
        return text;
    }
    debug!("Summary lost {} facts, appending them", missing.len());
    if text.is_empty() {
        render_facts(missing)
    } else {
        format!("{}\n\n{}", text, render_facts(missing))
    }
}

#[cfg(test)]
#[path = "compactor_tests.rs"]
mod tests;
