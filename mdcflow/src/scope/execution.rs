//! Scoped execution helper.

use super::DisposalPolicy;
use crate::context::{ContextSnapshot, ContextStore};
use tracing::trace;

/// Runs work on the current unit with a snapshot installed.
///
/// On every exit path, panics included, the unit's prior context is put
/// back. With [`DisposalPolicy::Dispose`] the unit's storage is then
/// released if that prior context was empty, so a pooled thread carries
/// nothing from one task into the next.
#[derive(Debug, Clone, Default)]
pub struct ScopedExecution {
    store: ContextStore,
    policy: DisposalPolicy,
}

impl ScopedExecution {
    /// Creates a helper over `store` with the given policy.
    #[must_use]
    pub fn new(store: ContextStore, policy: DisposalPolicy) -> Self {
        Self { store, policy }
    }

    /// Creates a helper over the process-wide store.
    #[must_use]
    pub fn global(policy: DisposalPolicy) -> Self {
        Self::new(ContextStore::global().clone(), policy)
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Returns the disposal policy.
    #[must_use]
    pub fn policy(&self) -> DisposalPolicy {
        self.policy
    }

    /// Returns a copy of this helper with another policy.
    #[must_use]
    pub fn with_policy(&self, policy: DisposalPolicy) -> Self {
        Self::new(self.store.clone(), policy)
    }

    /// Installs `snapshot` until the returned guard is dropped.
    #[must_use = "the context is restored as soon as the guard is dropped"]
    pub fn enter(&self, snapshot: &ContextSnapshot) -> ScopeGuard<'_> {
        let previous = self.store.snapshot();
        self.store.restore(snapshot);
        trace!(keys = snapshot.len(), policy = %self.policy, "Entered context scope");
        ScopeGuard {
            store: &self.store,
            previous,
            policy: self.policy,
        }
    }

    /// Runs `work` with `snapshot` installed and returns its output.
    ///
    /// A `Result` returned by `work` passes through untouched.
    pub fn run<F, R>(&self, snapshot: &ContextSnapshot, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.enter(snapshot);
        work()
    }

    /// Captures the current context and returns `work` bound to it.
    ///
    /// The returned closure can be moved to another unit and will run
    /// there under the context captured here.
    pub fn bind<F, R>(&self, work: F) -> impl FnOnce() -> R + Send + 'static
    where
        F: FnOnce() -> R + Send + 'static,
        R: 'static,
    {
        let snapshot = self.store.snapshot();
        let scope = self.clone();
        move || scope.run(&snapshot, work)
    }
}

/// Restores a unit's prior context when dropped.
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    store: &'a ContextStore,
    previous: ContextSnapshot,
    policy: DisposalPolicy,
}

impl ScopeGuard<'_> {
    /// Returns the context that will be restored.
    #[must_use]
    pub fn previous(&self) -> &ContextSnapshot {
        &self.previous
    }

    /// Captures the scoped context as it is now, then exits the scope.
    ///
    /// Used to carry changes made inside the scope to its next entry.
    #[must_use]
    pub fn exit(self) -> ContextSnapshot {
        self.store.snapshot()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.store.restore(&self.previous);
        if self.policy.disposes() && self.previous.is_empty() {
            self.store.dispose();
        }
    }
}

/// Runs `work` under `snapshot` using `store` and `policy`.
pub fn run_with_context<F, R>(
    store: &ContextStore,
    snapshot: &ContextSnapshot,
    policy: DisposalPolicy,
    work: F,
) -> R
where
    F: FnOnce() -> R,
{
    let previous = store.snapshot();
    store.restore(snapshot);
    let _guard = ScopeGuard {
        store,
        previous,
        policy,
    };
    work()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn snapshot_of(pairs: &[(&str, &str)]) -> ContextSnapshot {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_work_sees_snapshot() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        let seen = scope.run(&snapshot_of(&[("requestId", "r-1")]), || {
            scope.store().get("requestId").unwrap()
        });
        assert_eq!(seen.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_prior_context_restored() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        scope.store().put("caller", "yes").unwrap();

        scope.run(&snapshot_of(&[("worker", "yes")]), || {
            assert_eq!(scope.store().get("caller").unwrap(), None);
            scope.store().put("scratch", "1").unwrap();
        });

        assert_eq!(scope.store().keys(), vec!["caller".to_string()]);
    }

    #[test]
    fn test_failure_passes_through_and_restores() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        scope.store().put("caller", "yes").unwrap();
        let before = scope.store().snapshot();

        let result: Result<(), String> =
            scope.run(&snapshot_of(&[("k", "v")]), || Err("boom".to_string()));

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(scope.store().snapshot(), before);
    }

    #[test]
    fn test_panic_restores() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        scope.store().put("caller", "yes").unwrap();
        let before = scope.store().snapshot();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            scope.run(&snapshot_of(&[("k", "v")]), || panic!("work failed"));
        }));

        assert!(outcome.is_err());
        assert_eq!(scope.store().snapshot(), before);
    }

    #[test]
    fn test_retain_keeps_storage() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        scope.run(&snapshot_of(&[("k", "v")]), || {});
        assert!(scope.store().is_allocated());
        assert!(scope.store().is_empty());
    }

    #[test]
    fn test_dispose_releases_storage() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Dispose);
        scope.run(&snapshot_of(&[("k", "v")]), || {});
        assert!(!scope.store().is_allocated());
        assert_eq!(scope.store().live_units(), 0);
    }

    #[test]
    fn test_dispose_on_panic() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Dispose);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            scope.run(&snapshot_of(&[("k", "v")]), || panic!("work failed"));
        }));
        assert!(!scope.store().is_allocated());
    }

    #[test]
    fn test_dispose_never_drops_caller_context() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Dispose);
        scope.store().put("caller", "yes").unwrap();

        scope.run(&snapshot_of(&[("k", "v")]), || {});

        assert_eq!(scope.store().get("caller").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_nested_scopes_unwind_in_order() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        scope.store().put("level", "0").unwrap();

        scope.run(&snapshot_of(&[("level", "1")]), || {
            scope.run(&snapshot_of(&[("level", "2")]), || {
                assert_eq!(scope.store().get("level").unwrap().as_deref(), Some("2"));
            });
            assert_eq!(scope.store().get("level").unwrap().as_deref(), Some("1"));
        });

        assert_eq!(scope.store().get("level").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_guard_exit_captures_changes() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Retain);
        let guard = scope.enter(&snapshot_of(&[("a", "1")]));
        scope.store().put("b", "2").unwrap();
        let captured = guard.exit();

        assert_eq!(captured, snapshot_of(&[("a", "1"), ("b", "2")]));
        assert!(scope.store().is_empty());
    }

    #[test]
    fn test_bind_runs_on_other_thread() {
        let scope = ScopedExecution::new(ContextStore::new(), DisposalPolicy::Dispose);
        scope.store().put("requestId", "parent-123").unwrap();

        let bound = {
            let store = scope.store().clone();
            scope.bind(move || store.get("requestId").unwrap())
        };
        scope.store().clear();

        let seen = std::thread::spawn(bound).join().unwrap();
        assert_eq!(seen.as_deref(), Some("parent-123"));
        // The worker thread released its storage on the way out.
        assert_eq!(scope.store().live_units(), 1);
    }

    #[test]
    fn test_run_with_context_free_function() {
        let store = ContextStore::new();
        let snapshot = snapshot_of(&[("k", "v")]);
        let value = run_with_context(&store, &snapshot, DisposalPolicy::Retain, || {
            store.get("k").unwrap()
        });
        assert_eq!(value.as_deref(), Some("v"));
        assert!(store.is_empty());
    }
}
