//! Handles to submitted tasks.

use super::Task;
use crate::errors::TaskError;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum State<T> {
    Pending,
    Running,
    Done(Result<T, TaskError>),
    Taken,
}

#[derive(Debug)]
struct Completion<T> {
    state: Mutex<State<T>>,
    done: Condvar,
}

impl<T> Completion<T> {
    fn finish(&self, outcome: Result<T, TaskError>) {
        let mut state = self.state.lock();
        *state = State::Done(outcome);
        self.done.notify_all();
    }
}

/// A handle to the eventual result of a submitted task.
///
/// Cancellation only affects tasks that have not started; a running task
/// is never interrupted.
#[derive(Debug)]
pub struct TaskHandle<T> {
    completion: Arc<Completion<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Pairs `work` with a handle to its result.
    ///
    /// The returned task records the outcome of `work`, including a panic,
    /// so it can be handed to any executor.
    pub fn pair<F>(work: F) -> (Task, Self)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let completion = Arc::new(Completion {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
        });

        let shared = Arc::clone(&completion);
        let task: Task = Box::new(move || {
            {
                let mut state = shared.state.lock();
                if !matches!(*state, State::Pending) {
                    return;
                }
                *state = State::Running;
            }
            let outcome = catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| TaskError::from_panic(payload.as_ref()));
            shared.finish(outcome);
        });

        (task, Self { completion })
    }
}

impl<T> TaskHandle<T> {
    /// Returns true once the task has completed, failed or been cancelled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(*self.completion.state.lock(), State::Done(_) | State::Taken)
    }

    /// Returns true if the task was cancelled before it ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            *self.completion.state.lock(),
            State::Done(Err(TaskError::Cancelled))
        )
    }

    /// Cancels the task if it has not started.
    ///
    /// Returns true if this call cancelled it.
    pub fn cancel(&self) -> bool {
        let mut state = self.completion.state.lock();
        if matches!(*state, State::Pending) {
            *state = State::Done(Err(TaskError::Cancelled));
            self.completion.done.notify_all();
            true
        } else {
            false
        }
    }

    /// Blocks until the task is done.
    pub fn wait(&self) {
        let mut state = self.completion.state.lock();
        while matches!(*state, State::Pending | State::Running) {
            self.completion.done.wait(&mut state);
        }
    }

    /// Blocks until the task is done or `timeout` elapses.
    ///
    /// Returns true if the task is done.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Blocks until the task is done or `deadline` passes.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.completion.state.lock();
        while matches!(*state, State::Pending | State::Running) {
            if self
                .completion
                .done
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return !matches!(*state, State::Pending | State::Running);
            }
        }
        true
    }

    /// Waits for the task and returns its outcome.
    pub fn join(self) -> Result<T, TaskError> {
        self.wait();
        self.take()
    }

    /// Waits up to `timeout` for the task and returns its outcome.
    ///
    /// The task is left alone on timeout; it keeps running or queued.
    pub fn join_timeout(self, timeout: Duration) -> Result<T, TaskError> {
        if self.wait_timeout(timeout) {
            self.take()
        } else {
            Err(TaskError::TimedOut)
        }
    }

    fn take(&self) -> Result<T, TaskError> {
        let mut state = self.completion.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Done(outcome) => outcome,
            other => {
                *state = other;
                Err(TaskError::Cancelled)
            }
        }
    }
}
