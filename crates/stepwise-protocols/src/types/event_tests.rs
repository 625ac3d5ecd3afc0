    use super::*;

    #[test]
    fn test_append_assigns_increasing_sequences() {
        let mut log = SessionLog::new();
        log.append(EventKind::UserInstruction, "Open page");
        log.append(EventKind::ModelResponse, "done");
        log.append(EventKind::artifact("screenshot"), vec![1u8, 2, 3]);

        let sequences: Vec<u64> = log.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(log.next_sequence(), 4);
    }

    #[test]
    fn test_from_events_rejects_out_of_order() {
        let events = vec![
            SessionEvent::new(2, EventKind::System, "b"),
            SessionEvent::new(2, EventKind::System, "c"),
        ];
        let err = SessionLog::from_events(events).unwrap_err();
        assert!(matches!(err, SessionStoreError::OutOfOrder { previous: 2, next: 2 }));
    }

    #[test]
    fn test_replace_keeps_sequence_monotonic() {
        let mut log = SessionLog::new();
        for i in 0..5 {
            log.append(EventKind::ModelResponse, format!("r{}", i));
        }
        let kept: Vec<SessionEvent> = log.events()[..2].to_vec();
        log.replace(kept).unwrap();

        let event = log.append(EventKind::ModelResponse, "next");
        assert_eq!(event.sequence, 6);
    }

    #[test]
    fn test_tombstone_discards_payload_only() {
        let mut event = SessionEvent::new(7, EventKind::artifact("screenshot"), vec![0u8; 64])
            .with_variable("order_id", "A-17")
            .with_error("element not found");

        assert!(event.tombstone());
        assert!(event.tombstoned);
        assert_eq!(event.payload, Payload::Empty);
        assert_eq!(event.sequence, 7);
        assert_eq!(event.kind.artifact_sub_kind(), Some("screenshot"));
        assert_eq!(event.variables["order_id"], "A-17");
        assert_eq!(event.error.as_deref(), Some("element not found"));

        assert!(!event.tombstone());
        assert!(!event.is_live_artifact());
    }

    #[test]
    fn test_log_tombstone_by_sequence() {
        let mut log = SessionLog::new();
        log.append(EventKind::UserInstruction, "Open page");
        log.append(EventKind::artifact("screenshot"), vec![9u8; 4]);

        assert!(log.tombstone(2));
        assert!(!log.tombstone(2));
        assert!(!log.tombstone(42));
        assert!(log.events()[1].tombstoned);
        assert!(log.events()[1].payload.is_empty());
        assert!(!log.events()[0].tombstoned);
    }

    #[test]
    fn test_carries_facts() {
        let mut event = SessionEvent::new(1, EventKind::ModelResponse, "done");
        assert!(!event.carries_facts());
        event.error = Some("timeout".to_string());
        assert!(event.carries_facts());

        let mut summary = SessionEvent::new(2, EventKind::System, "so far");
        summary.summary = true;
        assert!(summary.carries_facts());
    }

    #[test]
    fn test_event_serialization_skips_defaults() {
        let event = SessionEvent::new(1, EventKind::UserInstruction, "go");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "user_instruction");
        assert_eq!(json["payload"]["type"], "text");
        assert!(json.get("variables").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("summary").is_none());

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_artifact_kind_serialization() {
        let kind = EventKind::artifact("page_snapshot");
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "action_artifact");
        assert_eq!(json["sub_kind"], "page_snapshot");
        assert_eq!(kind.label(), "page_snapshot");
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(Payload::Empty.len(), 0);
        assert!(Payload::Empty.is_empty());
        assert_eq!(Payload::from("abc").len(), 3);
        assert_eq!(Payload::from(vec![0u8; 10]).len(), 10);
        assert_eq!(Payload::from("abc").as_text(), Some("abc"));
        assert_eq!(Payload::from(vec![1u8]).as_text(), None);
    }
