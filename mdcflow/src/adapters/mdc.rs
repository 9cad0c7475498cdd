//! Diagnostic-context SPI backed by a [`ContextStore`].

use crate::context::ContextStore;
use crate::errors::ContextResult;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// The diagnostic-context plugin contract a logging framework calls into.
///
/// Flat key/value operations are required. Nested push/pop stacks are
/// optional and default to no-ops.
pub trait DiagnosticContext: Send + Sync {
    /// Puts `value` under `key`. `None` removes the key.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    fn put(&self, key: &str, value: Option<&str>) -> ContextResult<()>;

    /// Returns the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is empty.
    fn get(&self, key: &str) -> ContextResult<Option<String>>;

    /// Removes `key`.
    fn remove(&self, key: &str);

    /// Removes every key.
    fn clear(&self);

    /// Returns a copy of the whole context.
    fn copy_of_context_map(&self) -> HashMap<String, String>;

    /// Replaces the whole context. `None` clears it.
    fn set_context_map(&self, map: Option<&HashMap<String, String>>);

    /// Pushes `value` onto the nested stack under `key`.
    fn push_by_key(&self, key: &str, value: &str) {
        let _ = (key, value);
    }

    /// Pops from the nested stack under `key`.
    fn pop_by_key(&self, key: &str) -> Option<String> {
        let _ = key;
        None
    }

    /// Returns a copy of the nested stack under `key`.
    fn copy_of_deque_by_key(&self, key: &str) -> Option<VecDeque<String>> {
        let _ = key;
        None
    }

    /// Clears the nested stack under `key`.
    fn clear_deque_by_key(&self, key: &str) {
        let _ = key;
    }
}

/// Exposes a [`ContextStore`] as a [`DiagnosticContext`].
///
/// Nested stacks are not supported: pushes are dropped, pops and reads
/// report nothing.
#[derive(Debug, Clone)]
pub struct MdcAdapter {
    store: ContextStore,
}

impl MdcAdapter {
    /// Creates an adapter over `store`.
    #[must_use]
    pub fn new(store: ContextStore) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &ContextStore {
        &self.store
    }
}

impl Default for MdcAdapter {
    fn default() -> Self {
        Self::new(ContextStore::global().clone())
    }
}

impl DiagnosticContext for MdcAdapter {
    fn put(&self, key: &str, value: Option<&str>) -> ContextResult<()> {
        self.store.put_opt(key, value)
    }

    fn get(&self, key: &str) -> ContextResult<Option<String>> {
        self.store.get(key)
    }

    fn remove(&self, key: &str) {
        self.store.remove(key);
    }

    fn clear(&self) {
        self.store.clear();
    }

    fn copy_of_context_map(&self) -> HashMap<String, String> {
        self.store.copy_of_context_map()
    }

    fn set_context_map(&self, map: Option<&HashMap<String, String>>) {
        self.store.set_context_map(map);
    }

    fn push_by_key(&self, key: &str, _value: &str) {
        trace!(key, "Nested context not supported, push ignored");
    }
}
