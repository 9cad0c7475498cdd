//! Testing utilities for context propagation.
//!
//! This module provides:
//! - A recording executor for checking what reaches a delegate
//! - A fixed inbound request
//! - Assertions over a store's context

mod assertions;
mod mocks;

pub use assertions::{assert_context_empty, assert_context_eq, assert_disposed};
pub use mocks::{RecordingExecutor, StaticRequest};
