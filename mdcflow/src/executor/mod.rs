//! Task submission with context propagation.
//!
//! This module provides:
//! - The `TaskExecutor` submission surface and `TaskHandle` results
//! - Two concrete delegates: a fixed worker pool and a thread-per-task executor
//! - `PropagatingExecutor`, which carries the submitter's context to workers

mod handle;
mod per_task;
mod pool;
mod propagating;
mod traits;

pub use handle::TaskHandle;
pub use per_task::ThreadPerTaskExecutor;
pub use pool::{ThreadPoolConfig, ThreadPoolExecutor};
pub use propagating::{decorate, propagating_thread_per_task_executor, PropagatingExecutor};
pub use traits::{Task, TaskExecutor};
