//! File-backed state store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use stepwise_protocols::error::StateError;
use stepwise_protocols::types::{ExecutionState, StateUpdate, Workflow};

use crate::store::{advance_state, StateStore};

/// On-disk form of a run's state.
///
/// ```text
/// {state_dir}/
/// └── {run_id}/
///     └── state.json
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub run_id: String,
    pub workflow_fingerprint: String,
    pub total_steps: usize,
    pub state: ExecutionState,
    pub updated_at: DateTime<Utc>,
}

/// State store that persists every mutation before returning.
pub struct FileStateStore {
    path: PathBuf,
    document: Mutex<PersistedState>,
    total_steps: usize,
}

impl FileStateStore {
    /// Open the state of `run_id`, creating it if absent.
    ///
    /// Fails with [`StateError::WorkflowMismatch`] if the persisted state was
    /// produced by a different workflow.
    pub async fn open(
        state_dir: impl AsRef<Path>,
        run_id: &str,
        workflow: &Workflow,
    ) -> Result<Self, StateError> {
        let path = Self::state_path(state_dir.as_ref(), run_id);

        let document = match Self::read_document(&path).await? {
            Some(existing) => {
                if existing.workflow_fingerprint != workflow.fingerprint()
                    || existing.total_steps != workflow.len()
                {
                    return Err(StateError::WorkflowMismatch {
                        expected: workflow.fingerprint().to_string(),
                        found: existing.workflow_fingerprint,
                    });
                }
                info!(
                    "Resuming run {} at step {}/{}",
                    run_id, existing.state.step_pointer, existing.total_steps
                );
                existing
            }
            None => {
                let fresh = PersistedState {
                    run_id: run_id.to_string(),
                    workflow_fingerprint: workflow.fingerprint().to_string(),
                    total_steps: workflow.len(),
                    state: ExecutionState::default(),
                    updated_at: Utc::now(),
                };
                write_atomic(&path, &fresh).await?;
                debug!("Created state for run {} at {:?}", run_id, path);
                fresh
            }
        };

        Ok(Self {
            path,
            total_steps: document.total_steps,
            document: Mutex::new(document),
        })
    }

    /// Read a run's persisted state without opening a store.
    pub async fn read(
        state_dir: impl AsRef<Path>,
        run_id: &str,
    ) -> Result<Option<PersistedState>, StateError> {
        Self::read_document(&Self::state_path(state_dir.as_ref(), run_id)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state_path(state_dir: &Path, run_id: &str) -> PathBuf {
        state_dir.join(sanitize_run_id(run_id)).join("state.json")
    }

    async fn read_document(path: &Path) -> Result<Option<PersistedState>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Apply `mutate` to a copy, persist it, then publish it.
    ///
    /// A failed write leaves the in-memory state untouched.
    async fn mutate<F>(&self, mutate: F) -> Result<ExecutionState, StateError>
    where
        F: FnOnce(&mut ExecutionState) -> Result<(), StateError>,
    {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        mutate(&mut next.state)?;
        next.updated_at = Utc::now();
        write_atomic(&self.path, &next).await?;
        *document = next;
        Ok(document.state.clone())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn total_steps(&self) -> usize {
        self.total_steps
    }

    async fn get(&self) -> ExecutionState {
        self.document.lock().await.state.clone()
    }

    async fn advance(&self) -> Result<ExecutionState, StateError> {
        let total = self.total_steps;
        let state = self.mutate(|state| advance_state(state, total)).await?;
        debug!("Persisted step pointer {}", state.step_pointer);
        Ok(state)
    }

    async fn update(&self, update: StateUpdate) -> Result<ExecutionState, StateError> {
        self.mutate(|state| {
            state.apply(&update);
            Ok(())
        })
        .await
    }

    async fn reset(&self) -> Result<(), StateError> {
        self.mutate(|state| {
            *state = ExecutionState::default();
            Ok(())
        })
        .await?;
        info!("Reset state at {:?}", self.path);
        Ok(())
    }
}

/// Sanitize a run ID for use as a directory name.
pub(crate) fn sanitize_run_id(run_id: &str) -> String {
    run_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

async fn write_atomic(path: &Path, document: &PersistedState) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut content = serde_json::to_string_pretty(document)?;
    content.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
