//! File-based session store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use stepwise_protocols::error::SessionStoreError;
use stepwise_protocols::types::{check_order, SessionEvent};

use super::SessionStore;

/// Stores each run's log as `<dir>/<run_id>.events.json`.
pub struct FileSessionStore {
    directory: PathBuf,
}

impl FileSessionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn log_path(&self, run_id: &str) -> PathBuf {
        let safe: String = run_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.events.json", safe))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get_events(&self, run_id: &str) -> Result<Vec<SessionEvent>, SessionStoreError> {
        let path = self.log_path(run_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = tokio::fs::read_to_string(&path).await?;
        let events: Vec<SessionEvent> = serde_json::from_str(&json)?;
        check_order(&events)?;
        Ok(events)
    }

    async fn put_events(
        &self,
        run_id: &str,
        events: &[SessionEvent],
    ) -> Result<(), SessionStoreError> {
        check_order(events)?;
        tokio::fs::create_dir_all(&self.directory).await?;

        let path = self.log_path(run_id);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string(events)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("Saved {} events for run {} to {:?}", events.len(), run_id, path);
        Ok(())
    }

    async fn delete(&self, run_id: &str) -> Result<(), SessionStoreError> {
        let path = self.log_path(run_id);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
            debug!("Deleted session log: {:?}", path);
        }
        Ok(())
    }
}
