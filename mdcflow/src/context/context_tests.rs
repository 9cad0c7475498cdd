//! Property tests for the context store and snapshots.

#[cfg(test)]
mod tests {
    use crate::context::{current_unit, ContextSnapshot, ContextStore};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};

    const SAMPLES: &[(&str, &str)] = &[
        ("requestId", "parent-123"),
        ("k", ""),
        ("tenant", "acme corp"),
        ("unicode", "żółć-日本"),
        ("with=equals", "a=b"),
        ("long", "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"),
    ];

    #[test]
    fn test_put_get_for_all_samples() {
        let store = ContextStore::new();
        for (key, value) in SAMPLES {
            store.put(key, *value).unwrap();
            assert_eq!(store.get(key).unwrap().as_deref(), Some(*value));
        }
        assert_eq!(store.len(), SAMPLES.len());
    }

    #[test]
    fn test_put_none_equals_remove_for_all_samples() {
        for (key, value) in SAMPLES {
            let removed = ContextStore::new();
            removed.put(key, *value).unwrap();
            removed.put("other", "kept").unwrap();
            removed.remove(key);

            let nulled = ContextStore::new();
            nulled.put(key, *value).unwrap();
            nulled.put("other", "kept").unwrap();
            nulled.put_opt(key, None::<String>).unwrap();

            assert_eq!(removed.copy_of_context_map(), nulled.copy_of_context_map());
        }
    }

    #[test]
    fn test_restore_of_snapshot_is_identity() {
        let store = ContextStore::new();
        let empty = store.snapshot();
        store.restore(&empty);
        assert!(store.is_empty());
        assert!(!store.is_allocated());

        for (key, value) in SAMPLES {
            store.put(key, *value).unwrap();
            let before = store.copy_of_context_map();
            store.restore(&store.snapshot());
            assert_eq!(store.copy_of_context_map(), before);
        }
    }

    #[test]
    fn test_clear_twice_equals_clear_once() {
        let once = ContextStore::new();
        let twice = ContextStore::new();
        for (key, value) in SAMPLES {
            once.put(key, *value).unwrap();
            twice.put(key, *value).unwrap();
        }

        once.clear();
        twice.clear();
        twice.clear();

        assert_eq!(once.copy_of_context_map(), twice.copy_of_context_map());
        assert_eq!(once.is_allocated(), twice.is_allocated());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_changes() {
        let store = ContextStore::new();
        store.put("requestId", "r-1").unwrap();
        let snapshot = store.snapshot();

        store.put("requestId", "r-2").unwrap();
        store.put("late", "x").unwrap();
        store.clear();
        store.dispose();

        assert_eq!(snapshot.get("requestId"), Some("r-1"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_many_units_stay_isolated() {
        let store = ContextStore::new();
        let barrier = Arc::new(Barrier::new(8));

        let workers: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    store.put("unit", n.to_string()).unwrap();
                    barrier.wait();
                    let seen = store.get("unit").unwrap();
                    store.dispose();
                    seen
                })
            })
            .collect();

        for (n, worker) in workers.into_iter().enumerate() {
            assert_eq!(worker.join().unwrap(), Some(n.to_string()));
        }
        assert_eq!(store.live_units(), 0);
    }

    #[test]
    fn test_snapshot_crosses_units_by_copy() {
        let store = ContextStore::new();
        store.put("requestId", "parent-123").unwrap();
        let snapshot = store.snapshot();
        let parent = current_unit();

        let worker_store = store.clone();
        let worker = std::thread::spawn(move || {
            assert_ne!(current_unit(), parent);
            worker_store.restore(&snapshot);
            worker_store.put("requestId", "child").unwrap();
            worker_store.get("requestId").unwrap()
        });

        assert_eq!(worker.join().unwrap().as_deref(), Some("child"));
        assert_eq!(store.get("requestId").unwrap().as_deref(), Some("parent-123"));
    }

    #[test]
    fn test_snapshot_from_map_and_back() {
        let map: HashMap<String, String> = SAMPLES
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let snapshot = ContextSnapshot::from_map(map.clone());

        let store = ContextStore::new();
        store.restore(&snapshot);
        assert_eq!(store.copy_of_context_map(), map);
        assert_eq!(snapshot.to_map(), map);
    }
}
