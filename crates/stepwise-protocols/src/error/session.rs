//! Session store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event sequence out of order: {next} does not follow {previous}")]
    OutOfOrder { previous: u64, next: u64 },
}
