//! Thread-per-task executor.

use super::{Task, TaskExecutor};
use crate::errors::ExecutorError;
use crate::scope::DisposalPolicy;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tracker {
    active: usize,
    shutdown: bool,
    spawned: u64,
}

/// Runs every task on a fresh, short-lived thread.
///
/// Each thread exists for exactly one task, so its context storage is
/// disposable by construction.
#[derive(Debug)]
pub struct ThreadPerTaskExecutor {
    tracker: Arc<(Mutex<Tracker>, Condvar)>,
    thread_name_prefix: String,
}

impl Default for ThreadPerTaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPerTaskExecutor {
    /// Creates an executor with the default thread name prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_thread_name_prefix("mdcflow-task")
    }

    /// Creates an executor whose threads are named `{prefix}-{n}`.
    #[must_use]
    pub fn with_thread_name_prefix(prefix: impl Into<String>) -> Self {
        Self {
            tracker: Arc::new((Mutex::new(Tracker::default()), Condvar::new())),
            thread_name_prefix: prefix.into(),
        }
    }

    /// Returns the number of tasks currently running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.tracker.0.lock().active
    }

    fn terminated(tracker: &Tracker) -> bool {
        tracker.shutdown && tracker.active == 0
    }
}

impl TaskExecutor for ThreadPerTaskExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        let name = {
            let mut tracker = self.tracker.0.lock();
            if tracker.shutdown {
                warn!("Rejected task submitted after shutdown");
                return Err(ExecutorError::Shutdown);
            }
            tracker.active += 1;
            tracker.spawned += 1;
            format!("{}-{}", self.thread_name_prefix, tracker.spawned)
        };

        let shared = Arc::clone(&self.tracker);
        let spawned = std::thread::Builder::new().name(name).spawn(move || {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!(
                    thread = ?std::thread::current().name(),
                    "Task panicked on per-task thread"
                );
            }
            let (lock, cvar) = &*shared;
            let mut tracker = lock.lock();
            tracker.active -= 1;
            if Self::terminated(&tracker) {
                cvar.notify_all();
            }
        });

        if let Err(e) = spawned {
            let (lock, cvar) = &*self.tracker;
            let mut tracker = lock.lock();
            tracker.active -= 1;
            if Self::terminated(&tracker) {
                cvar.notify_all();
            }
            return Err(ExecutorError::Spawn(e.to_string()));
        }
        Ok(())
    }

    fn shutdown(&self) {
        let mut tracker = self.tracker.0.lock();
        if !tracker.shutdown {
            tracker.shutdown = true;
            debug!(active = tracker.active, "Thread-per-task executor shutting down");
        }
        if Self::terminated(&tracker) {
            self.tracker.1.notify_all();
        }
    }

    fn shutdown_now(&self) -> Vec<Task> {
        // Nothing is ever queued: every accepted task already has a thread.
        self.shutdown();
        Vec::new()
    }

    fn is_shutdown(&self) -> bool {
        self.tracker.0.lock().shutdown
    }

    fn is_terminated(&self) -> bool {
        Self::terminated(&self.tracker.0.lock())
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.tracker;
        let mut tracker = lock.lock();
        while !Self::terminated(&tracker) {
            if cvar.wait_until(&mut tracker, deadline).timed_out() {
                return Self::terminated(&tracker);
            }
        }
        true
    }

    fn disposal_policy(&self) -> DisposalPolicy {
        DisposalPolicy::Dispose
    }
}
