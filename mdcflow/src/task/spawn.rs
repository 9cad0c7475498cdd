//! Spawning and continuation helpers that carry the caller's context.

use super::ContextFuture;
use crate::context::ContextStore;
use crate::scope::{DisposalPolicy, ScopedExecution};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawns `future` on the current tokio runtime under the caller's context.
///
/// The context is captured now. Runtime worker storage is released after
/// each poll.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn<F>(store: &ContextStore, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let snapshot = store.snapshot();
    trace!(keys = snapshot.len(), "Spawning task with captured context");
    let scope = ScopedExecution::new(store.clone(), DisposalPolicy::Dispose);
    tokio::spawn(ContextFuture::new(future, snapshot, scope))
}

/// Runs `work` on tokio's blocking pool under the caller's context.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_blocking<F, R>(store: &ContextStore, work: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let scope = ScopedExecution::new(store.clone(), DisposalPolicy::Dispose);
    tokio::task::spawn_blocking(scope.bind(work))
}

/// Binds a continuation to the context current at this call.
///
/// Each invocation of the returned function installs the bound context,
/// runs `f` and restores whatever the invoking unit had before.
pub fn with_propagation<T, R, F>(scope: &ScopedExecution, f: F) -> impl Fn(T) -> R + Send + Sync + 'static
where
    F: Fn(T) -> R + Send + Sync + 'static,
    T: 'static,
    R: 'static,
{
    let snapshot = scope.store().snapshot();
    let scope = scope.clone();
    move |input| scope.run(&snapshot, || f(input))
}

/// Single-use form of [`with_propagation`].
pub fn with_propagation_once<T, R, F>(scope: &ScopedExecution, f: F) -> impl FnOnce(T) -> R + Send + 'static
where
    F: FnOnce(T) -> R + Send + 'static,
    T: 'static,
    R: 'static,
{
    let snapshot = scope.store().snapshot();
    let scope = scope.clone();
    move |input| scope.run(&snapshot, || f(input))
}
