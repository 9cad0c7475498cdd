//! A future that owns its diagnostic context.

use crate::context::{ContextSnapshot, ContextStore};
use crate::scope::{DisposalPolicy, ScopedExecution};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Wraps a future so it always runs under its own context.
///
/// Around every poll the wrapped context is installed on the polling
/// thread. Changes the future makes to it are captured after the poll and
/// carried to the next one, whichever thread that runs on. The polling
/// thread gets its prior context back after each poll.
pub struct ContextFuture<F> {
    inner: Pin<Box<F>>,
    context: ContextSnapshot,
    scope: ScopedExecution,
}

impl<F: Future> ContextFuture<F> {
    /// Wraps `future` to run under `context`.
    pub fn new(future: F, context: ContextSnapshot, scope: ScopedExecution) -> Self {
        Self {
            inner: Box::pin(future),
            context,
            scope,
        }
    }

    /// Returns the context the future will see on its next poll.
    #[must_use]
    pub fn context(&self) -> &ContextSnapshot {
        &self.context
    }
}

impl<F: Future> Future for ContextFuture<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let guard = this.scope.enter(&this.context);
        let poll = this.inner.as_mut().poll(cx);
        this.context = guard.exit();
        poll
    }
}

impl<F> std::fmt::Debug for ContextFuture<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFuture")
            .field("context", &self.context)
            .field("policy", &self.scope.policy())
            .finish_non_exhaustive()
    }
}

/// Extension methods for running futures under a context.
pub trait ContextFutureExt: Future + Sized {
    /// Runs this future under `context`.
    fn with_context(
        self,
        store: &ContextStore,
        context: ContextSnapshot,
        policy: DisposalPolicy,
    ) -> ContextFuture<Self> {
        ContextFuture::new(self, context, ScopedExecution::new(store.clone(), policy))
    }

    /// Runs this future under the caller's current context.
    fn in_current_context(self, store: &ContextStore, policy: DisposalPolicy) -> ContextFuture<Self> {
        let context = store.snapshot();
        self.with_context(store, context, policy)
    }
}

impl<F: Future> ContextFutureExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_future_sees_its_context() {
        let store = ContextStore::new();
        let context: ContextSnapshot = [("requestId", "f-1")].into_iter().collect();

        let inner = store.clone();
        let seen = tokio_test::block_on(
            async move { inner.get("requestId").unwrap() }.with_context(
                &store,
                context,
                DisposalPolicy::Retain,
            ),
        );

        assert_eq!(seen.as_deref(), Some("f-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_changes_carry_across_polls() {
        let store = ContextStore::new();
        store.put("caller", "outer").unwrap();

        let inner = store.clone();
        let future = async move {
            inner.put("step", "1").unwrap();
            tokio::task::yield_now().await;
            inner.get("step").unwrap()
        }
        .with_context(&store, ContextSnapshot::empty(), DisposalPolicy::Retain);

        let seen = tokio_test::block_on(future);
        assert_eq!(seen.as_deref(), Some("1"));
        assert_eq!(store.keys(), vec!["caller".to_string()]);
    }

    #[test]
    fn test_poller_context_restored_between_polls() {
        let store = ContextStore::new();
        store.put("poller", "p").unwrap();

        let inner = store.clone();
        let mut future = tokio_test::task::spawn(
            async move {
                let first = inner.get("poller").unwrap();
                tokio::task::yield_now().await;
                first
            }
            .in_current_context(&store, DisposalPolicy::Retain),
        );

        // The captured context included "poller", so the future sees it.
        assert!(future.poll().is_pending());
        store.put("poller", "changed").unwrap();
        let out = match future.poll() {
            Poll::Ready(v) => v,
            Poll::Pending => panic!("future should be ready"),
        };
        assert_eq!(out.as_deref(), Some("p"));
        assert_eq!(store.get("poller").unwrap().as_deref(), Some("changed"));
    }

    #[test]
    fn test_debug_lists_context() {
        let store = ContextStore::new();
        let future = async {}.with_context(
            &store,
            [("a", "1")].into_iter().collect(),
            DisposalPolicy::Dispose,
        );
        let rendered = format!("{future:?}");
        assert!(rendered.contains("ContextFuture"));
        assert!(rendered.contains("Dispose"));
    }
}
