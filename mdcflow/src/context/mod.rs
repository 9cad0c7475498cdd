//! Diagnostic context storage.
//!
//! This module provides:
//! - A per-execution-unit key/value store with explicit lifecycle control
//! - Immutable snapshots used to carry context across execution units

#[cfg(test)]
mod context_tests;
mod snapshot;
mod store;

pub use snapshot::ContextSnapshot;
pub use store::{current_unit, ContextStore, ExecutionUnitId};
