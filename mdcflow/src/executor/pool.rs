//! Fixed-size worker pool.

use super::{Task, TaskExecutor};
use crate::errors::ExecutorError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for a [`ThreadPoolExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPoolConfig {
    /// Number of worker threads (at least one).
    pub workers: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            thread_name_prefix: "mdcflow-worker".to_string(),
        }
    }
}

impl ThreadPoolConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    shutdown: bool,
    live_workers: usize,
}

struct Shared {
    state: Mutex<PoolState>,
    available: Condvar,
    terminated: Condvar,
}

/// A pool of long-lived worker threads fed from one queue.
///
/// Workers are reused across unrelated tasks, which is exactly the case
/// where context must not leak from one task into the next.
pub struct ThreadPoolExecutor {
    shared: Arc<Shared>,
    config: ThreadPoolConfig,
}

impl ThreadPoolExecutor {
    /// Starts a pool with `config.workers` threads.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Spawn` if a worker thread cannot be started.
    pub fn new(config: ThreadPoolConfig) -> Result<Self, ExecutorError> {
        let workers = config.workers.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            terminated: Condvar::new(),
        });

        for index in 0..workers {
            let worker_shared = Arc::clone(&shared);
            shared.state.lock().live_workers += 1;
            std::thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .spawn(move || worker_loop(&worker_shared))
                .map_err(|e| {
                    // Let the workers already started drain and exit.
                    let mut state = shared.state.lock();
                    state.live_workers -= 1;
                    state.shutdown = true;
                    shared.available.notify_all();
                    ExecutorError::Spawn(e.to_string())
                })?;
        }

        debug!(workers, prefix = %config.thread_name_prefix, "Started thread pool");
        Ok(Self { shared, config })
    }

    /// Starts a pool with `workers` threads and default naming.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Spawn` if a worker thread cannot be started.
    pub fn with_workers(workers: usize) -> Result<Self, ExecutorError> {
        Self::new(ThreadPoolConfig::new().with_workers(workers))
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if let Some(task) = state.queue.pop_front() {
                    break Some(task);
                }
                if state.shutdown {
                    break None;
                }
                shared.available.wait(&mut state);
            }
        };

        match task {
            Some(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    warn!(
                        thread = ?std::thread::current().name(),
                        "Task panicked on pool worker"
                    );
                }
            }
            None => break,
        }
    }

    let mut state = shared.state.lock();
    state.live_workers = state.live_workers.saturating_sub(1);
    if state.live_workers == 0 {
        shared.terminated.notify_all();
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            warn!("Rejected task submitted after shutdown");
            return Err(ExecutorError::Shutdown);
        }
        state.queue.push_back(task);
        self.shared.available.notify_one();
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if !state.shutdown {
            state.shutdown = true;
            debug!(queued = state.queue.len(), "Thread pool shutting down");
        }
        self.shared.available.notify_all();
    }

    fn shutdown_now(&self) -> Vec<Task> {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        let pending: Vec<Task> = state.queue.drain(..).collect();
        debug!(unstarted = pending.len(), "Thread pool shut down immediately");
        self.shared.available.notify_all();
        pending
    }

    fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    fn is_terminated(&self) -> bool {
        let state = self.shared.state.lock();
        state.shutdown && state.live_workers == 0
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !(state.shutdown && state.live_workers == 0) {
            if self
                .shared
                .terminated
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.shutdown && state.live_workers == 0;
            }
        }
        true
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ThreadPoolExecutor")
            .field("config", &self.config)
            .field("queued", &state.queue.len())
            .field("live_workers", &state.live_workers)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}
