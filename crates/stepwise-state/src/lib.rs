//! # Stepwise State
//!
//! The state store: the single source of truth for where a workflow run
//! stands. A crashed run resumes from whatever this store last persisted.
//!
//! - [`MemoryStateStore`] keeps state in process memory.
//! - [`FileStateStore`] persists every mutation as a JSON document, replaced
//!   atomically (temp file + rename).

pub mod file_store;
pub mod store;

pub use file_store::{FileStateStore, PersistedState};
pub use stepwise_protocols::error::StateError;
pub use store::{MemoryStateStore, StateStore};
