//! In-memory session store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use stepwise_protocols::error::SessionStoreError;
use stepwise_protocols::types::{check_order, SessionEvent};

use super::SessionStore;

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    logs: RwLock<HashMap<String, Vec<SessionEvent>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_events(&self, run_id: &str) -> Result<Vec<SessionEvent>, SessionStoreError> {
        let logs = self.logs.read().await;
        Ok(logs.get(run_id).cloned().unwrap_or_default())
    }

    async fn put_events(
        &self,
        run_id: &str,
        events: &[SessionEvent],
    ) -> Result<(), SessionStoreError> {
        check_order(events)?;
        self.logs
            .write()
            .await
            .insert(run_id.to_string(), events.to_vec());
        Ok(())
    }

    async fn delete(&self, run_id: &str) -> Result<(), SessionStoreError> {
        self.logs.write().await.remove(run_id);
        Ok(())
    }
}
