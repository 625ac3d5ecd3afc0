//! Error types for Stepwise.

mod inference;
mod run;
mod session;
mod state;
mod step;

pub use inference::InferenceError;
pub use run::RunError;
pub use session::SessionStoreError;
pub use state::StateError;
pub use step::StepError;
