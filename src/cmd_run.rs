//! `stepwise run`: drive a workflow to completion.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stepwise_config::Config;
use stepwise_protocols::{InferenceProvider, RunError};
use stepwise_provider_http::HttpInferenceProvider;
use stepwise_runtime::{
    BreakerSettings, CircuitBreaker, Compactor, FileSessionStore, Hook, HookChain, LlmSummarizer,
    RetryPolicy, RunContext, RunReport, RunnerSettings, StepRunner, WorkflowLoader,
};
use stepwise_state::FileStateStore;

use crate::error::CliError;

/// Run or resume the workflow at `workflow_path`.
pub(crate) async fn handle_run(
    config: &Config,
    workflow_path: &Path,
    run_id: Option<String>,
    system: Option<String>,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let workflow = WorkflowLoader::load(workflow_path)?;
    let provider: Arc<dyn InferenceProvider> =
        Arc::new(HttpInferenceProvider::from_config(&config.provider)?);

    let ctx = match run_id {
        Some(id) => RunContext::new(id),
        None => RunContext::generate(),
    }
    .with_cancel(cancel.clone());
    info!(
        "Run {} using workflow {} ({} steps)",
        ctx.run_id,
        workflow_path.display(),
        workflow.len()
    );

    let state = FileStateStore::open(config.storage.state_path(), &ctx.run_id, &workflow).await?;
    let sessions = FileSessionStore::new(config.storage.session_path());

    let retry = RetryPolicy::from_config(&config.runner, &config.retry);
    let summarizer = LlmSummarizer::new(provider.clone())
        .with_retry(retry.clone())
        .with_cancel(cancel);
    let compactor = Compactor::from_config(&config.compaction, Arc::new(summarizer));

    let mut settings = RunnerSettings::from(&config.runner);
    settings.system_prompt = system;

    let mut runner = StepRunner::new(workflow, provider, Arc::new(state), Arc::new(sessions))
        .with_settings(settings)
        .with_retry(retry)
        .with_breaker(Arc::new(CircuitBreaker::new(BreakerSettings::from(
            &config.breaker,
        ))))
        .with_compactor(compactor)
        .with_hooks(HookChain::new(vec![Hook::Trace]));

    match runner.run(&ctx).await {
        Ok(report) => {
            print_report(&report)?;
            Ok(())
        }
        Err(err) => {
            report_failure(&ctx.run_id, &err);
            Err(err.into())
        }
    }
}

fn print_report(report: &RunReport) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn report_failure(run_id: &str, err: &RunError) {
    match err {
        RunError::WorkflowExhausted {
            step_index,
            instruction,
            attempts,
            last_error,
        } => {
            error!("Run {} stopped at step {}", run_id, step_index);
            eprintln!(
                "Run {}: step {} failed after {} attempts\n  instruction: {}\n  last error: {}",
                run_id, step_index, attempts, instruction, last_error
            );
            eprintln!("Re-run with --run-id {} to resume from this step.", run_id);
        }
        RunError::Cancelled { step_index } => {
            eprintln!(
                "Run {} cancelled before step {}. Re-run with --run-id {} to resume.",
                run_id, step_index, run_id
            );
        }
        other => error!("Run {} aborted: {}", run_id, other),
    }
}
