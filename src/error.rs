//! Top-level error of the binary and its process exit codes.

use std::process::ExitCode;

use thiserror::Error;

use stepwise_config::ConfigError;
use stepwise_protocols::{InferenceError, RunError, SessionStoreError, StateError};
use stepwise_runtime::WorkflowError;

pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_FAILURE: u8 = 1;
pub(crate) const EXIT_EXHAUSTED: u8 = 2;
pub(crate) const EXIT_CANCELLED: u8 = 3;
pub(crate) const EXIT_INVARIANT: u8 = 4;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration:\n{0}")]
    Validation(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] InferenceError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("No state found for run {0}")]
    UnknownRun(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Run(#[from] RunError),
}

impl CliError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            Self::Run(RunError::WorkflowExhausted { .. }) => EXIT_EXHAUSTED,
            Self::Run(RunError::Cancelled { .. }) => EXIT_CANCELLED,
            Self::Run(RunError::MissingArtifact { .. })
            | Self::Run(RunError::State(StateError::InvalidTransition { .. }))
            | Self::State(StateError::InvalidTransition { .. }) => EXIT_INVARIANT,
            _ => EXIT_FAILURE,
        }
    }
}
