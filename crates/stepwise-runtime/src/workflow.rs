//! Workflow definition loading.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use stepwise_protocols::types::Workflow;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Workflow has no steps")]
    Empty,
}

#[derive(Deserialize)]
struct WorkflowFile {
    steps: Vec<String>,
}

/// Reads workflows from plain text or TOML.
///
/// Text files hold one instruction per line; blank lines and lines starting
/// with `#` are skipped. TOML files hold `steps = ["...", ...]`.
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn load(path: &Path) -> Result<Workflow, WorkflowError> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::parse_toml(&content)
        } else {
            Self::parse_text(&content)
        }
    }

    pub fn parse_text(content: &str) -> Result<Workflow, WorkflowError> {
        let steps: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        Self::build(steps)
    }

    pub fn parse_toml(content: &str) -> Result<Workflow, WorkflowError> {
        let file: WorkflowFile = toml::from_str(content)?;
        let steps: Vec<String> = file
            .steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self::build(steps)
    }

    fn build<S: Into<String>>(steps: Vec<S>) -> Result<Workflow, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::Empty);
        }
        Ok(Workflow::new(steps))
    }
}
