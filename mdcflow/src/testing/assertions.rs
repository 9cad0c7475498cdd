//! Assertions over a store's context.

use crate::context::ContextStore;
use std::collections::BTreeMap;

/// Asserts that the current unit's context holds exactly `expected`.
pub fn assert_context_eq(store: &ContextStore, expected: &[(&str, &str)]) {
    let actual: BTreeMap<String, String> = store.copy_of_context_map().into_iter().collect();
    let expected: BTreeMap<String, String> = expected
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    assert_eq!(actual, expected, "Context mismatch on {:?}", std::thread::current().id());
}

/// Asserts that the current unit's context is empty.
pub fn assert_context_empty(store: &ContextStore) {
    assert!(
        store.is_empty(),
        "Expected empty context, found keys: {:?}",
        store.keys()
    );
}

/// Asserts that the current unit has no storage allocated.
pub fn assert_disposed(store: &ContextStore) {
    assert!(
        !store.is_allocated(),
        "Expected storage to be released, found keys: {:?}",
        store.keys()
    );
}
