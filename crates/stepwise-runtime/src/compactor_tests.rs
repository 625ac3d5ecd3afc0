    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use stepwise_protocols::error::InferenceError;
    use stepwise_protocols::types::{Payload, SessionLog};

    /// Summarizer that forgets everything but a fixed sentence.
    struct ForgetfulSummarizer {
        calls: AtomicU32,
    }

    impl ForgetfulSummarizer {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Summarizer for ForgetfulSummarizer {
        async fn summarize(&self, _events: &[SessionEvent]) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("The user worked through the form.".to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _events: &[SessionEvent]) -> Result<String, InferenceError> {
            Err(InferenceError::Network("offline".to_string()))
        }
    }

    /// Interleaved instructions, responses and screenshots.
    fn busy_log(steps: usize) -> Vec<SessionEvent> {
        let mut log = SessionLog::new();
        for i in 0..steps {
            log.append(EventKind::UserInstruction, format!("step {}", i));
            let response = log.append(EventKind::ModelResponse, format!("did {}", i));
            if i == 1 {
                response.variables.insert("order_id".to_string(), "ORD-42".to_string());
            }
            if i == 2 {
                response.error = Some("button not found".to_string());
            }
            log.append(EventKind::artifact("screenshot"), vec![i as u8; 64]);
            log.append(EventKind::artifact("page_snapshot"), format!("<html>{}</html>", i));
        }
        log.into_events()
    }

    fn live_artifacts(events: &[SessionEvent], sub_kind: &str) -> usize {
        events
            .iter()
            .filter(|e| e.is_live_artifact() && e.kind.artifact_sub_kind() == Some(sub_kind))
            .count()
    }

    fn sequences(events: &[SessionEvent]) -> Vec<u64> {
        events.iter().map(|e| e.sequence).collect()
    }

    #[tokio::test]
    async fn test_only_newest_artifact_stays_live() {
        let compactor = Compactor::new(100, EvictionPolicy::Drop);
        let (events, report) = compactor.compact(busy_log(4)).await;

        assert_eq!(report.tombstoned, 6);
        assert_eq!(live_artifacts(&events, "screenshot"), 1);
        assert_eq!(live_artifacts(&events, "page_snapshot"), 1);

        let newest = events
            .iter()
            .rev()
            .find(|e| e.kind.artifact_sub_kind() == Some("screenshot"))
            .unwrap();
        assert!(!newest.tombstoned);
        assert_eq!(newest.payload, Payload::Bytes(vec![3u8; 64]));
    }

    #[tokio::test]
    async fn test_tombstone_keeps_sequence_and_kind() {
        let compactor = Compactor::new(100, EvictionPolicy::Drop);
        let original = busy_log(2);
        let (events, _) = compactor.compact(original.clone()).await;

        assert_eq!(sequences(&events), sequences(&original));
        let first_shot = &events[2];
        assert!(first_shot.tombstoned);
        assert_eq!(first_shot.payload, Payload::Empty);
        assert_eq!(first_shot.kind, EventKind::artifact("screenshot"));
    }

    #[tokio::test]
    async fn test_drop_keeps_window() {
        let compactor = Compactor::new(3, EvictionPolicy::Drop);
        let (events, report) = compactor.compact(busy_log(4)).await;

        assert_eq!(report.evicted, 5);
        assert!(!report.summarized);
        let conversational: Vec<&SessionEvent> =
            events.iter().filter(|e| !e.kind.is_artifact()).collect();
        assert_eq!(conversational.len(), 3);
        assert_eq!(conversational[2].payload.as_text(), Some("did 3"));
        assert_eq!(live_artifacts(&events, "screenshot"), 1);
    }

    #[tokio::test]
    async fn test_summary_replaces_evicted_events() {
        let summarizer = Arc::new(ForgetfulSummarizer::new());
        let compactor = Compactor::new(2, EvictionPolicy::Summarize(summarizer.clone()));
        let (events, report) = compactor.compact(busy_log(3)).await;

        assert!(report.summarized);
        assert_eq!(report.evicted, 4);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

        let summaries: Vec<&SessionEvent> = events.iter().filter(|e| e.summary).collect();
        assert_eq!(summaries.len(), 1);
        let summary = summaries[0];
        assert_eq!(summary.kind, EventKind::System);
        // Newest evicted event is the response of step 1.
        assert_eq!(summary.sequence, 6);
        assert_eq!(summary.variables["order_id"], "ORD-42");

        let seqs = sequences(&events);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_summary_keeps_tagged_values_and_errors() {
        let summarizer = Arc::new(ForgetfulSummarizer::new());
        let compactor = Compactor::new(1, EvictionPolicy::Summarize(summarizer));
        let (events, _) = compactor.compact(busy_log(4)).await;

        let summary = events.iter().find(|e| e.summary).unwrap();
        let text = summary.payload.as_text().unwrap();
        assert!(text.starts_with("The user worked through the form."));
        assert!(text.contains("Preserved facts:"));
        assert!(text.contains("ORD-42"));
        assert!(text.contains("button not found"));
    }

    #[tokio::test]
    async fn test_compaction_is_idempotent() {
        let summarizer = Arc::new(ForgetfulSummarizer::new());
        let compactor = Compactor::new(2, EvictionPolicy::Summarize(summarizer.clone()));

        let (once, _) = compactor.compact(busy_log(5)).await;
        let (twice, report) = compactor.compact(once.clone()).await;

        assert!(report.is_noop());
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resummarize_folds_previous_summary() {
        let compactor = Compactor::new(2, EvictionPolicy::Summarize(Arc::new(FactSummarizer)));
        let (mut events, _) = compactor.compact(busy_log(3)).await;

        let mut log = SessionLog::from_events(events.clone()).unwrap();
        log.append(EventKind::UserInstruction, "step 3");
        log.append(EventKind::ModelResponse, "did 3");
        events = log.into_events();

        let (events, _) = compactor.compact(events).await;
        let summaries: Vec<&SessionEvent> = events.iter().filter(|e| e.summary).collect();
        assert_eq!(summaries.len(), 1);
        let text = summaries[0].payload.as_text().unwrap();
        assert!(text.contains("ORD-42"));
        assert!(text.contains("button not found"));
    }

    #[tokio::test]
    async fn test_failing_summarizer_falls_back_to_facts() {
        let compactor = Compactor::new(1, EvictionPolicy::Summarize(Arc::new(FailingSummarizer)));
        let (events, report) = compactor.compact(busy_log(3)).await;

        assert!(report.summarized);
        let summary = events.iter().find(|e| e.summary).unwrap();
        assert!(summary.payload.as_text().unwrap().contains("ORD-42"));
    }

    #[tokio::test]
    async fn test_summary_truncated_but_facts_kept() {
        let compactor = Compactor::new(1, EvictionPolicy::Summarize(Arc::new(ForgetfulSummarizer::new())))
            .with_summary_max_chars(8);
        let (events, _) = compactor.compact(busy_log(3)).await;

        let text = events.iter().find(|e| e.summary).unwrap().payload.as_text().unwrap();
        assert!(text.starts_with("The user\n\n"));
        assert!(text.contains("ORD-42"));
    }

    #[test]
    fn test_verify_detects_duplicate_live_artifacts() {
        let events = busy_log(2);
        match Compactor::verify(&events) {
            Err(RunError::MissingArtifact { live, .. }) => assert_eq!(live, 2),
            other => panic!("expected violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_passes_after_compaction() {
        let (events, _) = Compactor::new(4, EvictionPolicy::Drop).compact(busy_log(6)).await;
        assert!(Compactor::verify(&events).is_ok());
    }

    #[tokio::test]
    async fn test_context_view_hides_tombstones() {
        let (events, _) = Compactor::new(100, EvictionPolicy::Drop).compact(busy_log(3)).await;
        let view = Compactor::context_view(&events);

        assert_eq!(view.len(), events.len() - 4);
        assert!(view.iter().all(|e| !e.tombstoned));
    }

    #[test]
    fn test_tombstone_stale_in_live_log() {
        let mut log = SessionLog::from_events(busy_log(3)).unwrap();
        let before = log.len();

        assert_eq!(Compactor::tombstone_stale(&mut log), 4);
        assert_eq!(log.len(), before);
        assert!(Compactor::verify(log.events()).is_ok());
        assert_eq!(Compactor::tombstone_stale(&mut log), 0);
    }

    #[test]
    fn test_request_view_bounds_conversation() {
        let compactor = Compactor::new(2, EvictionPolicy::Drop);
        let mut log = SessionLog::from_events(busy_log(5)).unwrap();
        Compactor::tombstone_stale(&mut log);

        let view = compactor.request_view(log.events());
        let plain: Vec<&SessionEvent> = view
            .iter()
            .filter(|e| !e.kind.is_artifact() && e.variables.is_empty() && e.error.is_none())
            .collect();
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[1].payload.as_text(), Some("did 4"));

        // Events carrying facts survive even outside the window.
        assert!(view.iter().any(|e| e.variables.contains_key("order_id")));
        assert!(view.iter().any(|e| e.error.as_deref() == Some("button not found")));
        assert_eq!(live_artifacts(&view, "screenshot"), 1);
        assert_eq!(live_artifacts(&view, "page_snapshot"), 1);
    }

    #[test]
    fn test_request_view_keeps_short_logs_whole() {
        let compactor = Compactor::new(8, EvictionPolicy::Drop);
        let events = busy_log(1);
        assert_eq!(compactor.request_view(&events), Compactor::context_view(&events));
    }

    #[test]
    fn test_missing_facts_need_key_and_value() {
        let mut facts = BTreeMap::new();
        facts.insert("attempts".to_string(), "3".to_string());

        let text = with_missing_facts("Tried 3 times.".to_string(), &facts);
        assert!(text.ends_with("Preserved facts:\n- attempts: 3"));

        let kept = with_missing_facts("Noted attempts: 3 so far.".to_string(), &facts);
        assert_eq!(kept, "Noted attempts: 3 so far.");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
