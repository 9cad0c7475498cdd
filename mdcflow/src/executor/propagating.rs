//! Context-propagating executor decorator.

use super::{Task, TaskExecutor, TaskHandle, ThreadPerTaskExecutor};
use crate::context::{ContextSnapshot, ContextStore};
use crate::errors::ExecutorError;
use crate::scope::{DisposalPolicy, PropagationConfig, ScopedExecution};
use std::time::Duration;
use tracing::trace;

/// Decorates an executor so every task runs under the submitter's context.
///
/// The context is captured on the submitting unit at submission time and
/// installed on the worker for the duration of the task. What the submitter
/// does to its own context afterwards is never seen by the task. Lifecycle
/// calls, return values and timeouts pass through to the delegate as is.
#[derive(Debug)]
pub struct PropagatingExecutor<E> {
    delegate: E,
    scope: ScopedExecution,
}

impl<E: TaskExecutor> PropagatingExecutor<E> {
    /// Wraps `delegate`, propagating context from `store`.
    ///
    /// Workers dispose if either `config` or the delegate asks for it.
    #[must_use]
    pub fn new(delegate: E, store: ContextStore, config: &PropagationConfig) -> Self {
        let policy = config.disposal.stricter(delegate.disposal_policy());
        Self {
            delegate,
            scope: ScopedExecution::new(store, policy),
        }
    }

    /// Wraps `delegate` over the process-wide store with the default
    /// configuration.
    #[must_use]
    pub fn decorate(delegate: E) -> Self {
        Self::new(delegate, ContextStore::global().clone(), &PropagationConfig::default())
    }

    /// Returns the wrapped executor.
    #[must_use]
    pub fn delegate(&self) -> &E {
        &self.delegate
    }

    /// Returns the store context is propagated from.
    #[must_use]
    pub fn store(&self) -> &ContextStore {
        self.scope.store()
    }

    /// Returns the disposal policy applied on workers.
    #[must_use]
    pub fn policy(&self) -> DisposalPolicy {
        self.scope.policy()
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> E {
        self.delegate
    }

    fn capture(&self) -> ContextSnapshot {
        let snapshot = self.scope.store().snapshot();
        trace!(keys = snapshot.len(), policy = %self.scope.policy(), "Captured context for submission");
        snapshot
    }

    fn wrap<F, R>(&self, snapshot: ContextSnapshot, work: F) -> impl FnOnce() -> R + Send + 'static
    where
        F: FnOnce() -> R + Send + 'static,
        R: 'static,
    {
        let scope = self.scope.clone();
        move || scope.run(&snapshot, work)
    }
}

impl PropagatingExecutor<ThreadPerTaskExecutor> {
    /// Creates a thread-per-task executor that propagates context from
    /// `store` and disposes each task thread's storage.
    #[must_use]
    pub fn thread_per_task(store: ContextStore) -> Self {
        Self::new(ThreadPerTaskExecutor::new(), store, &PropagationConfig::pooled())
    }
}

/// Wraps `delegate` over the process-wide store with the default
/// configuration.
#[must_use]
pub fn decorate<E: TaskExecutor>(delegate: E) -> PropagatingExecutor<E> {
    PropagatingExecutor::decorate(delegate)
}

/// Creates a thread-per-task executor over the process-wide store that
/// propagates context and disposes each task thread's storage.
#[must_use]
pub fn propagating_thread_per_task_executor() -> PropagatingExecutor<ThreadPerTaskExecutor> {
    PropagatingExecutor::thread_per_task(ContextStore::global().clone())
}

impl<E: TaskExecutor> TaskExecutor for PropagatingExecutor<E> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        let snapshot = self.capture();
        self.delegate.execute(Box::new(self.wrap(snapshot, task)))
    }

    fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let snapshot = self.capture();
        self.delegate.submit(self.wrap(snapshot, work))
    }

    fn submit_with_result<F, T>(&self, work: F, result: T) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() + Send + 'static,
        T: Send + 'static,
    {
        let snapshot = self.capture();
        self.delegate.submit_with_result(self.wrap(snapshot, work), result)
    }

    fn invoke_all<I, F, T>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let snapshot = self.capture();
        let wrapped: Vec<_> = tasks
            .into_iter()
            .map(|work| self.wrap(snapshot.clone(), work))
            .collect();
        self.delegate.invoke_all(wrapped)
    }

    fn invoke_all_timeout<I, F, T>(
        &self,
        tasks: I,
        timeout: Duration,
    ) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let snapshot = self.capture();
        let wrapped: Vec<_> = tasks
            .into_iter()
            .map(|work| self.wrap(snapshot.clone(), work))
            .collect();
        self.delegate.invoke_all_timeout(wrapped, timeout)
    }

    fn shutdown(&self) {
        self.delegate.shutdown();
    }

    fn shutdown_now(&self) -> Vec<Task> {
        self.delegate.shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        self.delegate.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.delegate.is_terminated()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.delegate.await_termination(timeout)
    }

    fn disposal_policy(&self) -> DisposalPolicy {
        self.scope.policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ThreadPoolExecutor;
    use crate::testing::RecordingExecutor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_worker_sees_submitter_context() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            ThreadPoolExecutor::with_workers(1).unwrap(),
            store.clone(),
            &PropagationConfig::default(),
        );
        store.put("requestId", "parent-123").unwrap();

        let worker_store = store.clone();
        let seen = executor
            .submit(move || worker_store.get("requestId").unwrap())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(seen.as_deref(), Some("parent-123"));
        assert_eq!(store.get("requestId").unwrap().as_deref(), Some("parent-123"));
    }

    #[test]
    fn test_snapshot_taken_at_submission() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            RecordingExecutor::new(),
            store.clone(),
            &PropagationConfig::default(),
        );

        store.put("phase", "submitted").unwrap();
        let worker_store = store.clone();
        let handle = executor
            .submit(move || worker_store.get("phase").unwrap())
            .unwrap();

        store.put("phase", "changed").unwrap();
        store.put("extra", "late").unwrap();

        // Run the queued task on a different unit than the submitter.
        let delegate = executor.into_inner();
        std::thread::spawn(move || delegate.run_pending()).join().unwrap();

        assert_eq!(handle.join().unwrap().as_deref(), Some("submitted"));
    }

    #[test]
    fn test_submit_with_result() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            ThreadPoolExecutor::with_workers(1).unwrap(),
            store.clone(),
            &PropagationConfig::default(),
        );
        store.put("k", "v").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker_store = store.clone();
        let handle = executor
            .submit_with_result(
                move || tx.send(worker_store.get("k").unwrap()).unwrap(),
                "fixed",
            )
            .unwrap();

        assert_eq!(handle.join(), Ok("fixed"));
        assert_eq!(rx.recv().unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_execute_wraps_raw_tasks() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            ThreadPoolExecutor::with_workers(1).unwrap(),
            store.clone(),
            &PropagationConfig::default(),
        );
        store.put("k", "v").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let worker_store = store.clone();
        executor
            .execute(Box::new(move || {
                tx.send(worker_store.get("k").unwrap()).unwrap();
            }))
            .unwrap();

        assert_eq!(rx.recv().unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_lifecycle_passes_through() {
        let executor = decorate(RecordingExecutor::new());

        assert!(!executor.is_shutdown());
        executor.shutdown();
        assert!(executor.is_shutdown());
        assert!(executor.shutdown_now().is_empty());
        assert!(executor.is_terminated());
        assert!(executor.await_termination(Duration::from_millis(250)));

        let calls = executor.delegate().calls();
        assert_eq!(
            calls,
            vec![
                "is_shutdown".to_string(),
                "shutdown".to_string(),
                "is_shutdown".to_string(),
                "shutdown_now".to_string(),
                "is_terminated".to_string(),
                "await_termination(250ms)".to_string(),
            ]
        );
    }

    #[test]
    fn test_invoke_all_timeout_passes_timeout_through() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            RecordingExecutor::inline(),
            store.clone(),
            &PropagationConfig::default(),
        );
        store.put("batch", "b-1").unwrap();

        let tasks: Vec<_> = (0..3)
            .map(|i| {
                let worker_store = store.clone();
                move || (i, worker_store.get("batch").unwrap())
            })
            .collect();
        let handles = executor
            .invoke_all_timeout(tasks, Duration::from_secs(7))
            .unwrap();

        assert_eq!(handles.len(), 3);
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), (i, Some("b-1".to_string())));
        }
        assert!(executor
            .delegate()
            .calls()
            .contains(&"invoke_all_timeout(7s)".to_string()));
    }

    #[test]
    fn test_rejection_passes_through() {
        let executor = decorate(ThreadPoolExecutor::with_workers(1).unwrap());
        executor.shutdown();
        assert_eq!(executor.submit(|| 1).unwrap_err(), ExecutorError::Shutdown);
    }

    #[test]
    fn test_delegate_policy_wins_over_default_config() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::new(
            ThreadPerTaskExecutor::new(),
            store.clone(),
            &PropagationConfig::default(),
        );
        assert_eq!(executor.policy(), DisposalPolicy::Dispose);
        assert_eq!(decorate(ThreadPerTaskExecutor::new()).policy(), DisposalPolicy::Dispose);
        assert_eq!(decorate(RecordingExecutor::new()).policy(), DisposalPolicy::Retain);

        store.put("requestId", "r-50").unwrap();
        for _ in 0..50 {
            let worker_store = store.clone();
            let seen = executor
                .submit(move || worker_store.get("requestId").unwrap())
                .unwrap()
                .join()
                .unwrap();
            assert_eq!(seen.as_deref(), Some("r-50"));
        }
        executor.shutdown();
        assert!(executor.await_termination(Duration::from_secs(5)));

        assert_eq!(store.live_units(), 1);
    }

    #[test]
    fn test_thread_per_task_disposes() {
        let store = ContextStore::new();
        let executor = PropagatingExecutor::thread_per_task(store.clone());
        assert_eq!(executor.policy(), DisposalPolicy::Dispose);

        store.put("requestId", "r-9").unwrap();
        let worker_store = store.clone();
        let seen = executor
            .submit(move || worker_store.get("requestId").unwrap())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(seen.as_deref(), Some("r-9"));
        // Only the submitting thread still holds storage.
        assert_eq!(store.live_units(), 1);
    }
}
