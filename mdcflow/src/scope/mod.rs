//! Scoped execution of work under a captured context.
//!
//! This module provides:
//! - `DisposalPolicy` for units whose storage must not outlive a task
//! - `ScopedExecution` and `ScopeGuard`, the restore-on-every-exit-path
//!   mechanism shared by every propagation point

mod execution;
mod policy;

pub use execution::{run_with_context, ScopeGuard, ScopedExecution};
pub use policy::{DisposalPolicy, PropagationConfig};
