//! Per-run execution context.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};

/// Everything a run needs that is not owned by the runner itself.
///
/// Passed explicitly into every runner call; there is no process-wide state.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    pub clock: Arc<dyn Clock>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }

    /// Context with a freshly generated run ID.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let a = RunContext::generate();
        let b = RunContext::generate();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_cancel_shared_with_clones() {
        let ctx = RunContext::new("run-1");
        let clone = ctx.clone();
        ctx.cancel.cancel();
        assert!(clone.is_cancelled());
    }
}
