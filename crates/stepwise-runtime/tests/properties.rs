//! Behavioural properties of the runner, breaker and compactor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use common::ScriptedProvider;
use stepwise_config::DEFAULT_SENTINEL;
use stepwise_protocols::error::{InferenceError, RunError, StepError};
use stepwise_protocols::types::{BreakerState, EventKind, SessionLog, StepVerdict, Workflow};
use stepwise_runtime::{
    Backoff, BreakerSettings, CircuitBreaker, Compactor, EvictionPolicy, FactSummarizer,
    FileSessionStore, HalfOpenPolicy, ManualClock, MemorySessionStore, RetryPolicy, RunContext,
    SessionStore, StepRunner,
};
use stepwise_state::{FileStateStore, MemoryStateStore, StateStore};

fn runner(workflow: Workflow, provider: Arc<ScriptedProvider>) -> (StepRunner, Arc<MemoryStateStore>) {
    let state = Arc::new(MemoryStateStore::new(workflow.len()));
    let runner = StepRunner::new(
        workflow,
        provider,
        state.clone(),
        Arc::new(MemorySessionStore::new()),
    )
    .with_retry(RetryPolicy::new(3, Backoff::none()))
    .with_breaker(Arc::new(CircuitBreaker::new(BreakerSettings {
        failure_threshold: 100,
        ..Default::default()
    })));
    (runner, state)
}

fn noisy_log() -> Vec<stepwise_protocols::types::SessionEvent> {
    let mut log = SessionLog::new();
    for i in 0..12 {
        log.append(EventKind::UserInstruction, format!("instruction {}", i));
        let response = log.append(EventKind::ModelResponse, format!("response {}", i));
        if i % 4 == 0 {
            response.error = Some(format!("error {}", i));
        }
        if i % 3 == 0 {
            response
                .variables
                .insert(format!("var{}", i), format!("value-{}", i));
        }
        let kind = if i % 2 == 0 { "screenshot" } else { "page_snapshot" };
        log.append(EventKind::artifact(kind), vec![i as u8; 32]);
    }
    log.into_events()
}

#[tokio::test]
async fn idempotent_compaction() {
    for policy in [
        EvictionPolicy::Drop,
        EvictionPolicy::Summarize(Arc::new(FactSummarizer)),
    ] {
        let compactor = Compactor::new(5, policy);
        let (once, _) = compactor.compact(noisy_log()).await;
        let (twice, report) = compactor.compact(once.clone()).await;

        assert!(report.is_noop());
        assert_eq!(
            serde_json::to_vec(&once).unwrap(),
            serde_json::to_vec(&twice).unwrap()
        );
    }
}

#[tokio::test]
async fn monotonic_pointer() {
    let workflow = Workflow::new(["A", "B", "C", "D"]);
    let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL).failing("B", 5).failing("C", 2));
    let (mut runner, state) = runner(workflow, provider);
    let ctx = RunContext::new("run-1");

    let mut previous = state.get().await.step_pointer;
    for _ in 0..8 {
        let _ = runner.run_step(&ctx).await;
        let current = state.get().await.step_pointer;
        assert!(current == previous || current == previous + 1);
        previous = current;
    }
    assert_eq!(previous, 4);
}

#[tokio::test]
async fn one_live_artifact_per_sub_kind() {
    for window in [1, 3, 10] {
        let (events, _) = Compactor::new(window, EvictionPolicy::Drop)
            .compact(noisy_log())
            .await;
        for sub_kind in ["screenshot", "page_snapshot"] {
            let live = events
                .iter()
                .filter(|e| e.is_live_artifact() && e.kind.artifact_sub_kind() == Some(sub_kind))
                .count();
            assert!(live <= 1, "{} live {} artifacts", live, sub_kind);
        }
        assert!(Compactor::verify(&events).is_ok());
    }
}

#[tokio::test]
async fn retry_boundary_is_exact() {
    let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL).failing("Open page", u32::MAX));
    let (mut runner, state) = runner(Workflow::new(["Open page"]), provider.clone());

    let err = runner.run(&RunContext::new("run-1")).await.unwrap_err();
    assert!(matches!(err, RunError::WorkflowExhausted { attempts: 3, step_index: 0, .. }));
    assert_eq!(provider.calls_for("Open page"), 3);
    assert_eq!(state.get().await.step_pointer, 0);
}

#[tokio::test]
async fn sentinel_short_circuit() {
    let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL).satisfied("Open page"));
    let (mut runner, state) = runner(Workflow::new(["Open page", "Submit form"]), provider.clone());

    let report = runner.run_step(&RunContext::new("run-1")).await.unwrap().unwrap();
    assert_eq!(report.verdict, StepVerdict::AlreadyDone);
    assert_eq!(report.attempts, 1);
    assert_eq!(provider.calls_for("Open page"), 1);
    assert_eq!(state.get().await.step_pointer, 1);
}

#[tokio::test]
async fn breaker_lifecycle() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let breaker = CircuitBreaker::with_clock(
        BreakerSettings {
            failure_threshold: 4,
            recovery_timeout: Duration::from_secs(90),
            half_open: HalfOpenPolicy::Optimistic,
        },
        clock.clone(),
    );

    for _ in 0..4 {
        breaker.failure();
    }
    assert_eq!(breaker.snapshot().state, BreakerState::Open);

    let mut invoked = false;
    let result = breaker
        .call(|| async {
            invoked = true;
            Ok::<_, InferenceError>(())
        })
        .await;
    assert!(matches!(result, Err(StepError::BreakerOpen { .. })));
    assert!(!invoked);

    clock.advance(Duration::from_secs(91));
    let result = breaker
        .call(|| async {
            invoked = true;
            Ok::<_, InferenceError>(())
        })
        .await;
    assert!(result.is_ok());
    assert!(invoked);
}

#[tokio::test]
async fn end_to_end_scenario() {
    let workflow = Workflow::new(["A", "B", "C"]);
    let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL).failing("B", 2));
    let (mut runner, state) = runner(workflow, provider.clone());

    let report = runner.run(&RunContext::new("run-1")).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(state.get().await.step_pointer, 3);
    assert_eq!(provider.calls_for("B"), 3);
    let attempts: Vec<u32> = report.steps.iter().map(|s| s.attempts).collect();
    assert_eq!(attempts, vec![1, 3, 1]);
}

#[tokio::test]
async fn resume_after_exhaustion_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let workflow = Workflow::new(["A", "B", "C"]);
    let sessions = Arc::new(FileSessionStore::new(dir.path().join("sessions")));

    {
        let state = Arc::new(
            FileStateStore::open(dir.path().join("state"), "run-1", &workflow)
                .await
                .unwrap(),
        );
        let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL).failing("B", 3));
        let mut runner = StepRunner::new(workflow.clone(), provider, state, sessions.clone())
            .with_retry(RetryPolicy::new(3, Backoff::none()));
        let err = runner.run(&RunContext::new("run-1")).await.unwrap_err();
        assert_eq!(err.step_index(), Some(1));
    }

    let state = Arc::new(
        FileStateStore::open(dir.path().join("state"), "run-1", &workflow)
            .await
            .unwrap(),
    );
    assert_eq!(state.get().await.step_pointer, 1);
    assert!(state.get().await.last_error.is_some());

    let provider = Arc::new(ScriptedProvider::new(DEFAULT_SENTINEL));
    let mut runner = StepRunner::new(workflow, provider.clone(), state.clone(), sessions.clone())
        .with_retry(RetryPolicy::new(3, Backoff::none()));
    let report = runner.run(&RunContext::new("run-1")).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(provider.calls_for("A"), 0);
    assert!(state.get().await.last_error.is_none());
    assert!(!sessions.get_events("run-1").await.unwrap().is_empty());
}
