//! Test doubles for executors and inbound requests.

use crate::adapters::InboundRequest;
use crate::errors::ExecutorError;
use crate::executor::{Task, TaskExecutor, TaskHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// An executor that records every call made to it.
///
/// In queueing mode (`new`) accepted tasks wait until
/// [`run_pending`](Self::run_pending) is called, on whichever thread calls
/// it. In inline mode (`inline`) tasks run immediately on the caller.
#[derive(Default)]
pub struct RecordingExecutor {
    inline: bool,
    pending: Mutex<VecDeque<Task>>,
    calls: Mutex<Vec<String>>,
    shutdown: Mutex<bool>,
}

impl RecordingExecutor {
    /// Creates a queueing executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor that runs tasks on the submitting thread.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            inline: true,
            ..Self::default()
        }
    }

    /// Runs all queued tasks on the current thread.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let tasks: Vec<Task> = self.pending.lock().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the recorded lifecycle and batch calls, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn submit_each<I, F, T>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tasks.into_iter().map(|work| self.submit(work)).collect()
    }
}

impl TaskExecutor for RecordingExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        if *self.shutdown.lock() {
            return Err(ExecutorError::Shutdown);
        }
        if self.inline {
            task();
        } else {
            self.pending.lock().push_back(task);
        }
        Ok(())
    }

    fn invoke_all<I, F, T>(&self, tasks: I) -> Result<Vec<TaskHandle<T>>, ExecutorError>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.record("invoke_all");
        self.submit_each(tasks)
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
        self.record(format!("invoke_all_timeout({timeout:?})"));
        self.submit_each(tasks)
    }

    fn shutdown(&self) {
        self.record("shutdown");
        *self.shutdown.lock() = true;
    }

    fn shutdown_now(&self) -> Vec<Task> {
        self.record("shutdown_now");
        *self.shutdown.lock() = true;
        self.pending.lock().drain(..).collect()
    }

    fn is_shutdown(&self) -> bool {
        self.record("is_shutdown");
        *self.shutdown.lock()
    }

    fn is_terminated(&self) -> bool {
        self.record("is_terminated");
        *self.shutdown.lock() && self.pending.lock().is_empty()
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.record(format!("await_termination({timeout:?})"));
        *self.shutdown.lock() && self.pending.lock().is_empty()
    }
}

impl std::fmt::Debug for RecordingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingExecutor")
            .field("inline", &self.inline)
            .field("pending", &self.pending())
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

/// A fixed inbound request.
#[derive(Debug, Clone, Default)]
pub struct StaticRequest {
    /// Request method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
}

impl StaticRequest {
    /// Creates a request without a query string.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: None,
        }
    }

    /// Sets the query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

impl InboundRequest for StaticRequest {
    fn method(&self) -> String {
        self.method.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query(&self) -> Option<String> {
        self.query.clone()
    }
}
