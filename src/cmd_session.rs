//! Offline subcommands over a run's persisted state and session log.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use stepwise_config::Config;
use stepwise_protocols::StateError;
use stepwise_runtime::{
    Compactor, EvictionPolicy, FactSummarizer, FileSessionStore, SessionStore, WorkflowLoader,
};
use stepwise_state::{FileStateStore, StateStore};

use crate::error::CliError;

pub(crate) async fn handle_status(
    config: &Config,
    run_id: &str,
    workflow_path: &Path,
) -> Result<(), CliError> {
    let status = run_status(config, run_id, workflow_path).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub(crate) async fn handle_reset(
    config: &Config,
    run_id: &str,
    workflow_path: &Path,
) -> Result<(), CliError> {
    reset_run(config, run_id, workflow_path).await?;
    println!("Run {} reset to step 0.", run_id);
    Ok(())
}

pub(crate) async fn handle_compact(config: &Config, run_id: &str, drop: bool) -> Result<(), CliError> {
    let (before, after) = compact_run(config, run_id, drop).await?;
    println!("Run {}: {} events before, {} live after compaction.", run_id, before, after);
    Ok(())
}

pub(crate) async fn handle_inspect(config: &Config, run_id: &str) -> Result<(), CliError> {
    let view = inspect_run(config, run_id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Pointer, flags and last error of a run, plus the instruction it resumes at.
async fn run_status(config: &Config, run_id: &str, workflow_path: &Path) -> Result<Value, CliError> {
    let workflow = WorkflowLoader::load(workflow_path)?;
    let persisted = FileStateStore::read(config.storage.state_path(), run_id)
        .await?
        .ok_or_else(|| CliError::UnknownRun(run_id.to_string()))?;
    if persisted.workflow_fingerprint != workflow.fingerprint() {
        return Err(StateError::WorkflowMismatch {
            expected: workflow.fingerprint().to_string(),
            found: persisted.workflow_fingerprint,
        }
        .into());
    }

    let state = persisted.state;
    let complete = state.is_complete(persisted.total_steps);
    let next = workflow.get(state.step_pointer).map(|s| s.instruction.clone());
    Ok(json!({
        "run_id": persisted.run_id,
        "step_pointer": state.step_pointer,
        "total_steps": persisted.total_steps,
        "complete": complete,
        "next_instruction": next,
        "flags": state.flags,
        "last_error": state.last_error,
        "updated_at": persisted.updated_at,
    }))
}

async fn reset_run(config: &Config, run_id: &str, workflow_path: &Path) -> Result<(), CliError> {
    let workflow = WorkflowLoader::load(workflow_path)?;
    let state = FileStateStore::open(config.storage.state_path(), run_id, &workflow).await?;
    state.reset().await?;
    FileSessionStore::new(config.storage.session_path())
        .delete(run_id)
        .await?;
    info!("Reset run {}", run_id);
    Ok(())
}

/// Returns the stored event count and the live count after compaction.
async fn compact_run(config: &Config, run_id: &str, drop: bool) -> Result<(usize, usize), CliError> {
    let sessions = FileSessionStore::new(config.storage.session_path());
    let events = sessions.get_events(run_id).await?;
    let before = events.len();

    let eviction = if drop {
        EvictionPolicy::Drop
    } else {
        EvictionPolicy::Summarize(Arc::new(FactSummarizer))
    };
    let compactor = Compactor::new(config.compaction.window, eviction)
        .with_summary_max_chars(config.compaction.summary_max_chars);
    let (events, report) = compactor.compact(events).await;
    Compactor::verify(&events)?;

    if !report.is_noop() {
        sessions.put_events(run_id, &events).await?;
    }
    info!(
        "Compacted run {}: {} tombstoned, {} evicted",
        run_id, report.tombstoned, report.evicted
    );
    Ok((before, Compactor::context_view(&events).len()))
}

async fn inspect_run(config: &Config, run_id: &str) -> Result<Value, CliError> {
    let events = FileSessionStore::new(config.storage.session_path())
        .get_events(run_id)
        .await?;
    Ok(serde_json::to_value(Compactor::context_view(&events))?)
}

#[cfg(test)]
#[path = "cmd_session_tests.rs"]
mod tests;
