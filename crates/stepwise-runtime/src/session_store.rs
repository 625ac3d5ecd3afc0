//! Session log persistence.

use async_trait::async_trait;

use stepwise_protocols::error::SessionStoreError;
use stepwise_protocols::types::SessionEvent;

#[path = "file_session_store.rs"]
mod file;
#[path = "memory_session_store.rs"]
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

/// Storage for a run's interaction log.
///
/// The log is auxiliary: losing it never loses progress, which lives in the
/// state store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All events of a run in sequence order; empty if none were stored.
    async fn get_events(&self, run_id: &str) -> Result<Vec<SessionEvent>, SessionStoreError>;

    /// Replace the stored log of a run.
    async fn put_events(
        &self,
        run_id: &str,
        events: &[SessionEvent],
    ) -> Result<(), SessionStoreError>;

    /// Remove a run's log.
    async fn delete(&self, run_id: &str) -> Result<(), SessionStoreError>;
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
