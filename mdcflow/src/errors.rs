//! Error types for the mdcflow crate.
//!
//! Absent keys and absent snapshots are not errors: they surface as `None`.
//! Only argument violations, refused submissions and tasks that never
//! produced a value are represented here.

use thiserror::Error;

/// The main error type for mdcflow operations.
#[derive(Debug, Error)]
pub enum MdcflowError {
    /// A context store operation was called with an invalid argument.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A task submission was refused.
    #[error("{0}")]
    Executor(#[from] ExecutorError),

    /// A submitted task did not produce a value.
    #[error("{0}")]
    Task(#[from] TaskError),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<serde_json::Error> for MdcflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Errors raised by the context store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The key was empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ContextError {
    /// Creates the error raised for an empty key.
    #[must_use]
    pub fn empty_key() -> Self {
        Self::InvalidArgument("key cannot be empty".to_string())
    }
}

/// Errors raised when submitting work to an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The executor has been shut down and accepts no more work.
    #[error("Executor is shut down")]
    Shutdown,

    /// The executor refused the task for another reason.
    #[error("Task rejected: {0}")]
    Rejected(String),

    /// A worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Outcome of a task handle that did not yield a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked while running.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled before it produced a value.
    #[error("Task cancelled")]
    Cancelled,

    /// Waiting for the task exceeded the given timeout.
    #[error("Timed out waiting for task")]
    TimedOut,
}

impl TaskError {
    /// Builds a `Panicked` error from a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        Self::Panicked(message)
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result alias for context store operations.
pub type ContextResult<T> = Result<T, ContextError>;
