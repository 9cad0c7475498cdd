//! Boundary adapters between the context store and its collaborators.
//!
//! This module provides:
//! - `MdcAdapter`, the store behind a logging framework's diagnostic-context SPI
//! - `ContextFormat`, a `tracing-subscriber` formatter that prints the context
//! - `RequestContextFilter`, which seeds and tears down context per request

mod fmt;
mod mdc;
mod request;

pub use fmt::ContextFormat;
pub use mdc::{DiagnosticContext, MdcAdapter};
pub use request::{InboundRequest, RequestContextConfig, RequestContextFilter, RequestIdFormat};

#[cfg(test)]
pub use request::MockInboundRequest;
