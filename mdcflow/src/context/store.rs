//! Per-execution-unit context storage.

use super::ContextSnapshot;
use crate::errors::{ContextError, ContextResult};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::ThreadId;
use tracing::trace;

/// Identity of an execution unit.
///
/// Every OS thread is an execution unit; pooled and dedicated threads are
/// told apart by the disposal policy of whoever runs work on them, not here.
pub type ExecutionUnitId = ThreadId;

/// Returns the identity of the calling execution unit.
#[must_use]
pub fn current_unit() -> ExecutionUnitId {
    std::thread::current().id()
}

static GLOBAL: OnceLock<ContextStore> = OnceLock::new();

type Registry = DashMap<ExecutionUnitId, HashMap<String, String>>;

/// Releases the current thread's entries when the thread exits.
///
/// Holds only weak references so a dropped store is not kept alive by the
/// threads that once wrote to it.
#[derive(Default)]
struct ExitReaper {
    unit: RefCell<Option<ExecutionUnitId>>,
    stores: RefCell<Vec<Weak<Registry>>>,
}

impl ExitReaper {
    fn register(&self, unit: ExecutionUnitId, units: &Arc<Registry>) {
        *self.unit.borrow_mut() = Some(unit);
        let mut stores = self.stores.borrow_mut();
        stores.retain(|store| store.strong_count() > 0);
        if !stores.iter().any(|store| std::ptr::eq(store.as_ptr(), Arc::as_ptr(units))) {
            stores.push(Arc::downgrade(units));
        }
    }
}

impl Drop for ExitReaper {
    fn drop(&mut self) {
        let Some(unit) = self.unit.get_mut().take() else {
            return;
        };
        for store in self.stores.get_mut().drain(..) {
            if let Some(units) = store.upgrade() {
                units.remove(&unit);
            }
        }
    }
}

thread_local! {
    static EXIT_REAPER: ExitReaper = ExitReaper::default();
}

/// Key/value diagnostic context, held separately for every execution unit.
///
/// A store is a registry keyed by execution-unit identity. Each unit only
/// ever touches its own entry, so entries are never observed by another
/// unit; the only way context crosses units is as a [`ContextSnapshot`].
///
/// Storage for a unit is allocated on its first write and released by
/// [`dispose`](Self::dispose) or when the unit's thread exits. `clear`
/// empties it but keeps it allocated.
///
/// Cloning a store yields another handle onto the same registry.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    units: Arc<Registry>,
}

impl ContextStore {
    /// Creates a new store with no allocated units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide store, creating it on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Puts a value for the current unit, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidArgument` if `key` is empty.
    pub fn put(&self, key: &str, value: impl Into<String>) -> ContextResult<()> {
        check_key(key)?;
        self.allocate().insert(key.to_string(), value.into());
        Ok(())
    }

    /// Puts a value, or removes the key when `value` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidArgument` if `key` is empty.
    pub fn put_opt<V: Into<String>>(&self, key: &str, value: Option<V>) -> ContextResult<()> {
        check_key(key)?;
        match value {
            Some(value) => self.put(key, value),
            None => {
                self.remove(key);
                Ok(())
            }
        }
    }

    /// Gets the value for `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidArgument` if `key` is empty.
    pub fn get(&self, key: &str) -> ContextResult<Option<String>> {
        check_key(key)?;
        Ok(self
            .units
            .get(&current_unit())
            .and_then(|entries| entries.get(key).cloned()))
    }

    /// Checks if `key` is present for the current unit.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.units
            .get(&current_unit())
            .is_some_and(|entries| entries.contains_key(key))
    }

    /// Removes `key`. Empty or absent keys are ignored.
    pub fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        if let Some(mut entries) = self.units.get_mut(&current_unit()) {
            entries.remove(key);
        }
    }

    /// Removes every entry of the current unit, keeping its storage.
    pub fn clear(&self) {
        if let Some(mut entries) = self.units.get_mut(&current_unit()) {
            entries.clear();
        }
    }

    /// Returns the number of entries for the current unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.get(&current_unit()).map_or(0, |entries| entries.len())
    }

    /// Returns true if the current unit has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current unit's keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .units
            .get(&current_unit())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Captures an immutable copy of the current unit's context.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        match self.units.get(&current_unit()) {
            Some(entries) if !entries.is_empty() => {
                ContextSnapshot::from_map(entries.value().clone())
            }
            _ => ContextSnapshot::empty(),
        }
    }

    /// Replaces the current unit's context with the snapshot's contents.
    ///
    /// `None` restores to empty. Restoring an empty snapshot never
    /// allocates storage for a unit that has none.
    pub fn restore<'a>(&self, snapshot: impl Into<Option<&'a ContextSnapshot>>) {
        let unit = current_unit();
        match snapshot.into() {
            Some(snapshot) if !snapshot.is_empty() => {
                let mut entries = self.allocate();
                entries.clear();
                entries.extend(snapshot.iter().map(|(k, v)| (k.to_string(), v.to_string())));
            }
            _ => {
                if let Some(mut entries) = self.units.get_mut(&unit) {
                    entries.clear();
                }
            }
        }
    }

    /// Releases the current unit's storage entirely.
    ///
    /// Subsequent access starts from an empty, unallocated context.
    pub fn dispose(&self) {
        if let Some((unit, entries)) = self.units.remove(&current_unit()) {
            trace!(unit = ?unit, keys = entries.len(), "Disposed context storage");
        }
    }

    /// Returns a copy of the current unit's entries.
    #[must_use]
    pub fn copy_of_context_map(&self) -> HashMap<String, String> {
        self.units
            .get(&current_unit())
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    /// Clears the current unit's context, then puts every entry of `map`.
    ///
    /// Entries with an empty key are skipped.
    pub fn set_context_map(&self, map: Option<&HashMap<String, String>>) {
        let snapshot = map.map(|m| ContextSnapshot::from_map(m.clone()));
        self.restore(snapshot.as_ref());
    }

    /// Alias of [`dispose`](Self::dispose).
    pub fn clear_thread_local(&self) {
        self.dispose();
    }

    /// Returns true if the current unit has storage allocated.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.units.contains_key(&current_unit())
    }

    /// Returns the number of units with storage allocated.
    #[must_use]
    pub fn live_units(&self) -> usize {
        self.units.len()
    }
}

impl ContextStore {
    /// Returns the current unit's entries, allocating them on first use.
    fn allocate(&self) -> RefMut<'_, ExecutionUnitId, HashMap<String, String>> {
        let unit = current_unit();
        match self.units.entry(unit) {
            Entry::Occupied(entries) => entries.into_ref(),
            Entry::Vacant(slot) => {
                // Fails only while this thread is already tearing down its
                // thread locals; the entry then needs an explicit dispose.
                let _ = EXIT_REAPER.try_with(|reaper| reaper.register(unit, &self.units));
                slot.insert(HashMap::new())
            }
        }
    }
}

fn check_key(key: &str) -> ContextResult<()> {
    if key.is_empty() {
        Err(ContextError::empty_key())
    } else {
        Ok(())
    }
}
