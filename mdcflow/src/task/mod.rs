//! Context propagation for async tasks and continuations.
//!
//! This module provides:
//! - `ContextFuture`, which carries its own context from poll to poll
//! - `spawn` and `spawn_blocking`, which capture at call time and run on tokio
//! - `with_propagation`, which binds a continuation to the context captured now

mod future;
mod spawn;

pub use future::{ContextFuture, ContextFutureExt};
pub use spawn::{spawn, spawn_blocking, with_propagation, with_propagation_once};
