//! The task-submission surface.

use super::TaskHandle;
use crate::errors::ExecutorError;
use crate::scope::DisposalPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A unit of work accepted by an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A surface that accepts tasks and runs them on some execution unit.
///
/// Implementors provide `execute` and the lifecycle controls; `submit`,
/// `submit_with_result` and the batch operations are built on `execute`
/// and may be overridden.
pub trait TaskExecutor: Send + Sync {
    /// Hands `task` to the executor.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the task is refused.
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;

    /// Submits `work` and returns a handle to its result.
    fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        Self: Sized,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = TaskHandle::pair(work);
        self.execute(task)?;
        Ok(handle)
    }

    /// Submits `work` and returns a handle that yields `result` once it ran.
    fn submit_with_result<F, T>(&self, work: F, result: T) -> Result<TaskHandle<T>, ExecutorError>
    where
        Self: Sized,
        F: FnOnce() + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move || {
            work();
            result
        })
    }

    /// Submits every task and waits for all of them.
    ///
    /// If one submission is refused, the tasks already submitted are
    /// cancelled and the error is returned.
    fn invoke_all<I, F, T>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        Self: Sized,
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handles = submit_batch(self, tasks)?;
        for handle in &handles {
            handle.wait();
        }
        Ok(handles)
    }

    /// Submits every task and waits for all of them, at most `timeout`.
    ///
    /// Tasks still unfinished when the timeout expires are cancelled.
    fn invoke_all_timeout<I, F, T>(
        &self,
        tasks: I,
        timeout: Duration,
    ) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        Self: Sized,
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let handles = submit_batch(self, tasks)?;
        let mut expired = false;
        for handle in &handles {
            if expired || !handle.wait_until(deadline) {
                expired = true;
                handle.cancel();
            }
        }
        Ok(handles)
    }

    /// Stops accepting tasks; queued tasks still run.
    fn shutdown(&self);

    /// Stops accepting tasks and returns the ones that never started.
    fn shutdown_now(&self) -> Vec<Task>;

    /// Returns true once `shutdown` or `shutdown_now` has been called.
    fn is_shutdown(&self) -> bool;

    /// Returns true once shut down and every task has finished.
    fn is_terminated(&self) -> bool;

    /// Blocks until terminated or `timeout` elapses.
    ///
    /// Returns true if the executor terminated.
    fn await_termination(&self, timeout: Duration) -> bool;

    /// Disposal policy the executor's own threads call for.
    ///
    /// Executors whose threads are short-lived or shared between unrelated
    /// tasks return `Dispose`.
    fn disposal_policy(&self) -> DisposalPolicy {
        DisposalPolicy::Retain
    }
}

fn submit_batch<E, I, F, T>(executor: &E, tasks: I) -> Result<Vec<TaskHandle<T>>, ExecutorError>
where
    E: TaskExecutor,
    I: IntoIterator<Item = F>,
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut handles = Vec::new();
    for work in tasks {
        match executor.submit(work) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                for handle in &handles {
                    handle.cancel();
                }
                return Err(e);
            }
        }
    }
    Ok(handles)
}

impl<E: TaskExecutor + ?Sized> TaskExecutor for Arc<E> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        (**self).execute(task)
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }

    fn shutdown_now(&self) -> Vec<Task> {
        (**self).shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        (**self).await_termination(timeout)
    }

    fn disposal_policy(&self) -> DisposalPolicy {
        (**self).disposal_policy()
    }
}

impl<E: TaskExecutor + ?Sized> TaskExecutor for Box<E> {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        (**self).execute(task)
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }

    fn shutdown_now(&self) -> Vec<Task> {
        (**self).shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        (**self).is_terminated()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        (**self).await_termination(timeout)
    }

    fn disposal_policy(&self) -> DisposalPolicy {
        (**self).disposal_policy()
    }
}
