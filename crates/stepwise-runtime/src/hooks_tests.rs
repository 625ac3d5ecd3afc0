    use super::*;
    use stepwise_protocols::types::{EventKind, ExecutionState, SessionEvent, WorkflowStep};

    fn request_with_context(sizes: &[usize]) -> InferenceRequest {
        let step = WorkflowStep {
            index: 0,
            instruction: "Open page".to_string(),
        };
        let context = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                SessionEvent::new(i as u64 + 1, EventKind::ModelResponse, "x".repeat(*size))
            })
            .collect();
        InferenceRequest::for_step("run-1", &step, 1, &ExecutionState::default())
            .with_context(context)
    }

    #[test]
    fn test_context_budget_drops_oldest() {
        let hook = Hook::ContextBudget { max_bytes: 25 };
        let request = hook.before_invoke(request_with_context(&[10, 10, 10, 10]));

        assert_eq!(request.context.len(), 2);
        assert_eq!(request.context[0].sequence, 3);
        assert!(request.context_bytes() <= 25);
    }

    #[test]
    fn test_context_budget_keeps_fact_events() {
        let mut request = request_with_context(&[10, 10, 10, 10]);
        request.context[0].summary = true;
        request.context[1].error = Some("button not found".to_string());
        request.context[2]
            .variables
            .insert("order_id".to_string(), "ORD-42".to_string());

        let request = Hook::ContextBudget { max_bytes: 25 }.before_invoke(request);

        let sequences: Vec<u64> = request.context.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(request.context[0].summary);
    }

    #[test]
    fn test_context_budget_noop_when_fits() {
        let hook = Hook::ContextBudget { max_bytes: 1000 };
        let request = hook.before_invoke(request_with_context(&[10, 10]));
        assert_eq!(request.context.len(), 2);
    }

    #[test]
    fn test_fail_soft_recovers_permanent_errors_only() {
        let hook = Hook::FailSoft;
        let recovered = hook
            .on_error(&InferenceError::InvalidRequest("bad schema".to_string()))
            .unwrap();
        assert!(!recovered.is_success);
        assert!(recovered.output_text.contains("bad schema"));

        assert!(hook.on_error(&InferenceError::Timeout(5)).is_none());
    }

    #[test]
    fn test_trace_passes_through() {
        let request = request_with_context(&[3]);
        assert_eq!(Hook::Trace.before_invoke(request.clone()), request);

        let response = InferenceResponse::success("ok");
        assert_eq!(Hook::Trace.on_result(response.clone()), response);
        assert!(Hook::Trace.on_error(&InferenceError::Timeout(1)).is_none());
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = HookChain::new(vec![
            Hook::Trace,
            Hook::ContextBudget { max_bytes: 10 },
            Hook::FailSoft,
        ]);
        let request = chain.before_invoke(request_with_context(&[10, 10, 10]));
        assert_eq!(request.context.len(), 1);

        let recovered = chain.on_error(&InferenceError::AuthenticationFailed("expired".to_string()));
        assert!(recovered.is_some());
    }

    #[test]
    fn test_empty_chain_recovers_nothing() {
        let chain = HookChain::default();
        assert!(chain
            .on_error(&InferenceError::InvalidRequest("x".to_string()))
            .is_none());
    }
