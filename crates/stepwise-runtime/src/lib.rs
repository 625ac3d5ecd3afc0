//! # Stepwise Runtime
//!
//! The step runner and everything it drives: the retry policy and circuit
//! breaker around the inference call, invocation hooks, response
//! classification, session stores and context compaction.

pub mod breaker;
pub mod clock;
pub mod compactor;
pub mod context;
pub mod hooks;
pub mod interpret;
pub mod retry;
pub mod runner;
pub mod session_store;
pub mod summarizer;
pub mod workflow;

pub use breaker::{BreakerSettings, CircuitBreaker, HalfOpenPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compactor::{CompactionReport, Compactor, EvictionPolicy};
pub use context::RunContext;
pub use hooks::{Hook, HookChain, InvokeHook};
pub use interpret::Interpreter;
pub use retry::{Backoff, RetryError, RetryPolicy, Retryable};
pub use runner::{RunReport, RunnerSettings, StepReport, StepRunner};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use summarizer::{FactSummarizer, LlmSummarizer, Summarizer};
pub use workflow::{WorkflowError, WorkflowLoader};
