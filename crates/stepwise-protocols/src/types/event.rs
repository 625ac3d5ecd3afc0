//! Session events and the append-only session log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SessionStoreError;

/// Kind of a session event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    System,
    UserInstruction,
    ModelResponse,
    /// Large perceptual payload such as a screenshot or page capture.
    ActionArtifact { sub_kind: String },
}

impl EventKind {
    pub fn artifact(sub_kind: impl Into<String>) -> Self {
        Self::ActionArtifact {
            sub_kind: sub_kind.into(),
        }
    }

    pub fn is_artifact(&self) -> bool {
        matches!(self, Self::ActionArtifact { .. })
    }

    pub fn artifact_sub_kind(&self) -> Option<&str> {
        match self {
            Self::ActionArtifact { sub_kind } => Some(sub_kind),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::System => "system",
            Self::UserInstruction => "instruction",
            Self::ModelResponse => "response",
            Self::ActionArtifact { sub_kind } => sub_kind,
        }
    }
}

/// Event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Text(text) => text.len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One entry of the interaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub sequence: u64,
    pub kind: EventKind,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub tombstoned: bool,
    /// Explicitly tagged values that compaction must never lose.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    /// Recorded error message, preserved verbatim by compaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Marks a compaction summary.
    #[serde(default, skip_serializing_if = "is_false")]
    pub summary: bool,
}

impl SessionEvent {
    pub fn new(sequence: u64, kind: EventKind, payload: impl Into<Payload>) -> Self {
        Self {
            sequence,
            kind,
            payload: payload.into(),
            tombstoned: false,
            variables: BTreeMap::new(),
            error: None,
            summary: false,
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Discard the payload, keeping sequence, kind and preserved facts.
    ///
    /// Returns `false` if the event was already a tombstone.
    pub fn tombstone(&mut self) -> bool {
        if self.tombstoned {
            return false;
        }
        self.tombstoned = true;
        self.payload = Payload::Empty;
        true
    }

    pub fn is_live_artifact(&self) -> bool {
        self.kind.is_artifact() && !self.tombstoned
    }

    /// Summaries and events holding variables or an error.
    pub fn carries_facts(&self) -> bool {
        self.summary || !self.variables.is_empty() || self.error.is_some()
    }
}

/// Append-only, strictly ordered collection of session events.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLog {
    events: Vec<SessionEvent>,
    next_sequence: u64,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild a log from persisted events, validating their order.
    pub fn from_events(events: Vec<SessionEvent>) -> Result<Self, SessionStoreError> {
        let mut log = Self::new();
        log.replace(events)?;
        Ok(log)
    }

    /// Append a new event with the next sequence number.
    pub fn append(&mut self, kind: EventKind, payload: impl Into<Payload>) -> &mut SessionEvent {
        let event = SessionEvent::new(self.next_sequence, kind, payload);
        self.next_sequence += 1;
        self.events.push(event);
        let last = self.events.len() - 1;
        &mut self.events[last]
    }

    /// Replace the whole log, e.g. with a compacted version.
    ///
    /// The next sequence number never goes backwards.
    pub fn replace(&mut self, events: Vec<SessionEvent>) -> Result<(), SessionStoreError> {
        check_order(&events)?;
        if let Some(last) = events.last() {
            self.next_sequence = self.next_sequence.max(last.sequence + 1);
        }
        self.events = events;
        Ok(())
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Tombstone the event with `sequence`. Returns `false` if there is no
    /// such event or it already was one.
    pub fn tombstone(&mut self, sequence: u64) -> bool {
        match self.events.binary_search_by_key(&sequence, |e| e.sequence) {
            Ok(index) => self.events[index].tombstone(),
            Err(_) => false,
        }
    }

    pub fn into_events(self) -> Vec<SessionEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Fail if sequence numbers are not strictly increasing.
pub fn check_order(events: &[SessionEvent]) -> Result<(), SessionStoreError> {
    for pair in events.windows(2) {
        if pair[1].sequence <= pair[0].sequence {
            return Err(SessionStoreError::OutOfOrder {
                previous: pair[0].sequence,
                next: pair[1].sequence,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
