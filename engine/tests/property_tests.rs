use ensemble_engine::memory::{HistoryEntry, MemoryStore};
use ensemble_engine::notification_bus::{Event, EventKind, NotificationBus};
use ensemble_engine::workflow::Reference;
use proptest::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// History never grows past its bound and always keeps the newest entries.
proptest! {
    #[test]
    fn test_history_bound_holds(max in 1usize..20, pushes in 0usize..60) {
        let mut store = MemoryStore::with_limit("agent", NotificationBus::new(), max).unwrap();
        for i in 0..pushes {
            store.add_to_history(HistoryEntry::new(json!(i), format!("r{}", i)));
        }

        let history = store.get_history(None);
        prop_assert_eq!(history.len(), pushes.min(max));
        if pushes > 0 {
            prop_assert_eq!(&history.last().unwrap().response, &format!("r{}", pushes - 1));
            let first = pushes.saturating_sub(max);
            prop_assert_eq!(&history[0].response, &format!("r{}", first));
        }
    }
}

// Storing the same value twice notifies once.
proptest! {
    #[test]
    fn test_remember_is_idempotent(key in "[a-z]{1,12}", value in any::<i64>()) {
        let bus = NotificationBus::new();
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        bus.subscribe("memoryUpdated", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        let mut store = MemoryStore::new("agent", bus);
        prop_assert!(store.remember(key.clone(), json!(value)));
        prop_assert!(!store.remember(key.clone(), json!(value)));
        prop_assert_eq!(store.recall(&key), Some(&json!(value)));
        prop_assert_eq!(updates.load(Ordering::SeqCst), 1);
    }
}

// A "mem*" listener sees every memory event and nothing else.
proptest! {
    #[test]
    fn test_wildcard_prefix_matching(kinds in proptest::collection::vec(0usize..EventKind::ALL.len(), 1..30)) {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe("mem*", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        let mut expected = 0;
        for index in kinds {
            let kind = EventKind::ALL[index];
            if kind.as_str().starts_with("mem") {
                expected += 1;
            }
            prop_assert_eq!(bus.listener_count(kind), usize::from(kind.as_str().starts_with("mem")));
            if kind == EventKind::MemoryCleared {
                bus.emit(Event::MemoryCleared { owner: "agent".to_string() });
            } else if kind.as_str().starts_with("mem") {
                bus.emit(Event::MemoryForgotten {
                    owner: "agent".to_string(),
                    key: "k".to_string(),
                    value: json!(null),
                });
            } else {
                bus.emit(Event::ToolAdded {
                    agent_id: "agent".to_string(),
                    tool: "t".to_string(),
                });
            }
        }

        prop_assert_eq!(hits.load(Ordering::SeqCst), expected);
    }
}

// Job references parse for any well-formed id and path.
proptest! {
    #[test]
    fn test_job_reference_parsing(
        job in "[A-Za-z0-9_-]{1,16}",
        path in proptest::collection::vec("[A-Za-z0-9_-]{1,8}", 0..4),
    ) {
        let mut text = format!("jobs.{}.output", job);
        for segment in &path {
            text.push('.');
            text.push_str(segment);
        }

        let parsed = Reference::parse(&text);
        prop_assert_eq!(parsed, Some(Reference::JobOutput { job_id: job, path }));
    }
}
