//! The step runner.
//!
//! Drives a workflow one instruction at a time. Each step goes through
//! `BUILD_REQUEST -> INVOKE -> INTERPRET` and then advances, retries or
//! aborts. Progress lives only in the [`StateStore`]; the runner itself can
//! be dropped and rebuilt at any point.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use stepwise_config::RunnerConfig;
use stepwise_protocols::error::{InferenceError, RunError, StepError};
use stepwise_protocols::inference::{InferenceProvider, InferenceRequest};
use stepwise_protocols::types::{
    EventKind, Payload, SessionLog, StateUpdate, StepVerdict, Workflow, WorkflowStep,
};
use stepwise_state::StateStore;

use crate::breaker::{BreakerSettings, CircuitBreaker};
use crate::compactor::{Compactor, EvictionPolicy};
use crate::context::RunContext;
use crate::hooks::{HookChain, InvokeHook};
use crate::interpret::{extract_flags, flag_text, Interpreter};
use crate::retry::{self, RetryPolicy};
use crate::session_store::SessionStore;
use crate::summarizer::FactSummarizer;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Upper bound for a single inference call.
    pub step_timeout: Duration,
    pub sentinel: String,
    /// Compact the session log after every N completed steps.
    pub compaction_interval: u32,
    pub system_prompt: Option<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for RunnerSettings {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            sentinel: config.sentinel.clone(),
            compaction_interval: config.compaction_interval,
            system_prompt: None,
        }
    }
}

/// Outcome of one completed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub instruction: String,
    pub attempts: u32,
    pub verdict: StepVerdict,
}

/// Consolidated report of one `run()` call.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.completed_steps >= self.total_steps
    }
}

pub struct StepRunner {
    workflow: Workflow,
    provider: Arc<dyn InferenceProvider>,
    state: Arc<dyn StateStore>,
    sessions: Arc<dyn SessionStore>,
    compactor: Compactor,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    hooks: HookChain,
    interpreter: Interpreter,
    settings: RunnerSettings,
    log: Option<SessionLog>,
    completed: u32,
}

impl StepRunner {
    pub fn new(
        workflow: Workflow,
        provider: Arc<dyn InferenceProvider>,
        state: Arc<dyn StateStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let settings = RunnerSettings::default();
        Self {
            workflow,
            provider,
            state,
            sessions,
            compactor: Compactor::new(8, EvictionPolicy::Summarize(Arc::new(FactSummarizer))),
            breaker: Arc::new(CircuitBreaker::new(BreakerSettings::default())),
            retry: RetryPolicy::default(),
            hooks: HookChain::default(),
            interpreter: Interpreter::new(settings.sentinel.clone()),
            settings,
            log: None,
            completed: 0,
        }
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.interpreter = Interpreter::new(settings.sentinel.clone());
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a breaker shared with other runners.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = compactor;
        self
    }

    pub fn with_hooks(mut self, hooks: HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// The session log as of the last finished step.
    pub fn session_log(&self) -> Option<&SessionLog> {
        self.log.as_ref()
    }

    /// Run steps until the workflow completes or a step aborts.
    pub async fn run(&mut self, ctx: &RunContext) -> Result<RunReport, RunError> {
        let started_at = ctx.clock.now();
        let start = self.state.get().await.step_pointer;
        info!(
            "Run {} starting at step {}/{}",
            ctx.run_id,
            start,
            self.workflow.len()
        );

        let mut steps = Vec::new();
        while let Some(report) = self.run_step(ctx).await? {
            steps.push(report);
        }

        let completed_steps = self.state.get().await.step_pointer;
        info!("Run {} completed {} steps", ctx.run_id, completed_steps);
        Ok(RunReport {
            run_id: ctx.run_id.clone(),
            completed_steps,
            total_steps: self.workflow.len(),
            started_at,
            finished_at: ctx.clock.now(),
            steps,
        })
    }

    /// Execute the step the pointer is on, with all its attempts.
    ///
    /// Returns `None` once every step is done.
    pub async fn run_step(&mut self, ctx: &RunContext) -> Result<Option<StepReport>, RunError> {
        let step_index = self.state.get().await.step_pointer;
        if ctx.is_cancelled() {
            return Err(RunError::Cancelled { step_index });
        }
        let Some(step) = self.workflow.get(step_index).cloned() else {
            return Ok(None);
        };

        let mut log = self.take_log(&ctx.run_id).await?;
        let mut result = self.execute_step(ctx, &mut log, &step).await;

        if result.is_ok() {
            self.completed += 1;
            if self.completed % self.settings.compaction_interval.max(1) == 0 {
                if let Err(err) = self.compact_log(&mut log).await {
                    result = Err(err);
                }
            }
        } else if let Err(err) = self.compact_log(&mut log).await {
            warn!("Failed to compact session log after abort: {}", err);
        }

        let saved = self.sessions.put_events(&ctx.run_id, log.events()).await;
        self.log = Some(log);
        match (result, saved) {
            (Ok(report), Ok(())) => Ok(Some(report)),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), saved) => {
                if let Err(save_err) = saved {
                    warn!("Failed to save session log after abort: {}", save_err);
                }
                Err(err)
            }
        }
    }

    async fn take_log(&mut self, run_id: &str) -> Result<SessionLog, RunError> {
        match self.log.take() {
            Some(log) => Ok(log),
            None => {
                let events = self.sessions.get_events(run_id).await?;
                debug!("Loaded {} session events for run {}", events.len(), run_id);
                let mut log = SessionLog::from_events(events)?;
                self.compact_log(&mut log).await?;
                Ok(log)
            }
        }
    }

    async fn compact_log(&self, log: &mut SessionLog) -> Result<(), RunError> {
        let (compacted, report) = self.compactor.compact(log.events().to_vec()).await;
        Compactor::verify(&compacted)?;
        if !report.is_noop() {
            log.replace(compacted)?;
        }
        Ok(())
    }

    async fn execute_step(
        &self,
        ctx: &RunContext,
        log: &mut SessionLog,
        step: &WorkflowStep,
    ) -> Result<StepReport, RunError> {
        info!(
            "Step {}/{}: {}",
            step.index + 1,
            self.workflow.len(),
            step.instruction
        );
        log.append(EventKind::UserInstruction, step.instruction.as_str());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.attempt(ctx, log, step, attempt).await {
                Ok((StepVerdict::Failed(reason), _)) => StepError::Failed(reason),
                Ok((verdict, flags)) => {
                    self.complete_step(step, &verdict, flags).await?;
                    return Ok(StepReport {
                        index: step.index,
                        instruction: step.instruction.clone(),
                        attempts: attempt,
                        verdict,
                    });
                }
                Err(err) => err,
            };

            self.state
                .update(StateUpdate::new().error(error.to_string()))
                .await?;

            if let StepError::Fatal(inner) = &error {
                error!("Step {} aborted: {}", step.index, inner);
                return Err(RunError::Inference(inner.clone()));
            }

            let Some(delay) = self.retry.delay_before_retry(attempt, &error) else {
                error!(
                    "Step {} exhausted after {} attempts: {}",
                    step.index, attempt, error
                );
                return Err(RunError::WorkflowExhausted {
                    step_index: step.index,
                    instruction: step.instruction.clone(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            };

            warn!(
                "Step {} attempt {}/{} failed: {}, retrying in {:?}",
                step.index, attempt, self.retry.max_attempts, error, delay
            );
            if !retry::wait(delay, &ctx.cancel).await {
                return Err(RunError::Cancelled {
                    step_index: step.index,
                });
            }
        }
    }

    /// One invocation: breaker, hooks, bounded call, classification.
    ///
    /// Records the response and its artifacts in `log`.
    async fn attempt(
        &self,
        ctx: &RunContext,
        log: &mut SessionLog,
        step: &WorkflowStep,
        attempt: u32,
    ) -> Result<(StepVerdict, Option<Map<String, Value>>), StepError> {
        self.breaker.allow()?;

        let stale = Compactor::tombstone_stale(log);
        if stale > 0 {
            debug!("Tombstoned {} stale artifacts before attempt {}", stale, attempt);
        }
        let state = self.state.get().await;
        let mut request = InferenceRequest::for_step(&ctx.run_id, step, self.workflow.len(), &state)
            .with_context(self.compactor.request_view(log.events()))
            .with_attempt(attempt)
            .with_timeout(self.settings.step_timeout);
        if let Some(system) = &self.settings.system_prompt {
            request = request.with_system(system.clone());
        }
        let request = self.hooks.before_invoke(request);
        debug!(
            "Invoking {} for step {} attempt {} with {} context events",
            self.provider.id(),
            step.index,
            attempt,
            request.context.len()
        );

        let result = match timeout(self.settings.step_timeout, self.provider.invoke(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.settings.step_timeout.as_secs())),
        };

        let response = match result {
            Ok(response) => self.hooks.on_result(response),
            Err(err) => match self.hooks.on_error(&err) {
                Some(response) => response,
                None => {
                    self.breaker.failure();
                    log.append(EventKind::ModelResponse, Payload::Empty).error = Some(err.to_string());
                    return Err(err.into());
                }
            },
        };

        let verdict = self.interpreter.classify(&response);
        let flags = match verdict {
            StepVerdict::Success => extract_flags(&response.output_text),
            _ => None,
        };

        let event = log.append(EventKind::ModelResponse, response.output_text.as_str());
        if let StepVerdict::Failed(reason) = &verdict {
            event.error = Some(reason.clone());
        }
        if let Some(flags) = &flags {
            for (key, value) in flags {
                event.variables.insert(key.clone(), flag_text(value));
            }
        }
        if verdict != StepVerdict::AlreadyDone {
            for artifact in &response.artifacts {
                log.append(EventKind::artifact(&artifact.sub_kind), artifact.payload.clone());
            }
        }

        match &verdict {
            StepVerdict::Failed(_) => self.breaker.failure(),
            _ => self.breaker.success(),
        }
        Ok((verdict, flags))
    }

    /// Merge reported flags, clear the error and move the pointer on.
    async fn complete_step(
        &self,
        step: &WorkflowStep,
        verdict: &StepVerdict,
        flags: Option<Map<String, Value>>,
    ) -> Result<(), RunError> {
        let mut update = StateUpdate::new().clear_error();
        if let Some(flags) = flags {
            debug!("Step {} reported {} flags", step.index, flags.len());
            update = update.flags(flags);
        }
        self.state.update(update).await?;
        let state = self.state.advance().await?;
        match verdict {
            StepVerdict::AlreadyDone => info!(
                "Step {} already satisfied, pointer now {}",
                step.index, state.step_pointer
            ),
            _ => info!("Step {} succeeded, pointer now {}", step.index, state.step_pointer),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
