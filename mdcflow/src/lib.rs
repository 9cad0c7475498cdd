//! # Mdcflow
//!
//! A mapped diagnostic context that follows work across threads, pools and
//! async tasks.
//!
//! Mdcflow keeps a small key/value context (a request id, a tenant) per
//! execution unit and carries it across concurrency boundaries:
//!
//! - **Context store**: per-thread storage with explicit allocation and disposal
//! - **Snapshots**: immutable copies captured on one unit and installed on another
//! - **Scoped execution**: run work under a snapshot and always restore afterwards
//! - **Propagating executors**: capture at submission, restore in the worker
//! - **Adapters**: a logging diagnostic-context SPI, a `tracing` formatter and
//!   an inbound-request filter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mdcflow::prelude::*;
//!
//! let store = ContextStore::global();
//! let executor = decorate(ThreadPoolExecutor::with_workers(4)?);
//!
//! store.put("requestId", "parent-123")?;
//! let seen = executor
//!     .submit(|| ContextStore::global().get("requestId"))?
//!     .join()?;
//! assert_eq!(seen?.as_deref(), Some("parent-123"));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod context;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod scope;
pub mod task;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        ContextFormat, DiagnosticContext, InboundRequest, MdcAdapter, RequestContextConfig,
        RequestContextFilter,
    };
    pub use crate::context::{ContextSnapshot, ContextStore};
    pub use crate::errors::{ContextError, ExecutorError, MdcflowError, TaskError};
    pub use crate::executor::{
        decorate, propagating_thread_per_task_executor, PropagatingExecutor, TaskExecutor,
        TaskHandle, ThreadPerTaskExecutor, ThreadPoolConfig, ThreadPoolExecutor,
    };
    pub use crate::observability::{init_logging, LoggingConfig};
    pub use crate::scope::{DisposalPolicy, PropagationConfig, ScopedExecution};
    pub use crate::task::{spawn, spawn_blocking, with_propagation, ContextFuture, ContextFutureExt};
}
