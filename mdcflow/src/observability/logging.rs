//! Installs a `tracing` subscriber that renders the diagnostic context.

use crate::adapters::ContextFormat;
use crate::context::ContextStore;
use crate::errors::MdcflowError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format;
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `mdcflow=debug,info`.
    /// `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit one JSON object per event.
    pub json: bool,
    /// Render the emitting unit's context with every event.
    pub with_context: bool,
    /// Include the emitting thread's name.
    pub thread_names: bool,
    /// Include the event target.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            with_context: true,
            thread_names: true,
            target: true,
        }
    }
}

impl LoggingConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Enables or disables context rendering.
    #[must_use]
    pub fn with_context(mut self, with_context: bool) -> Self {
        self.with_context = with_context;
        self
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `MdcflowError::Config` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, MdcflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Installs the global subscriber, rendering context from the process-wide
/// store.
///
/// # Errors
///
/// Returns `MdcflowError::Logging` if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), MdcflowError> {
    init_logging_with_store(config, ContextStore::global().clone())
}

/// Installs the global subscriber, rendering context from `store`.
///
/// # Errors
///
/// Returns `MdcflowError::Logging` if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging_with_store(config: &LoggingConfig, store: ContextStore) -> Result<(), MdcflowError> {
    let filter = env_filter(config)?;

    let installed = match (config.json, config.with_context) {
        (false, true) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .event_format(ContextFormat::new(
                store,
                format()
                    .with_target(config.target)
                    .with_thread_names(config.thread_names),
            ))
            .try_init(),
        (true, true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .event_format(ContextFormat::json(
                store,
                format()
                    .json()
                    .with_target(config.target)
                    .with_thread_names(config.thread_names),
            ))
            .try_init(),
        (false, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.target)
            .with_thread_names(config.thread_names)
            .try_init(),
        (true, false) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(config.target)
            .with_thread_names(config.thread_names)
            .try_init(),
    };

    installed.map_err(|e| MdcflowError::Logging(e.to_string()))
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, MdcflowError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives),
        _ => parse_filter(&config.filter),
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter, MdcflowError> {
    EnvFilter::try_new(directives)
        .map_err(|e| MdcflowError::Logging(format!("Invalid filter '{directives}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "info");
        assert!(!config.json);
        assert!(config.with_context);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = LoggingConfig::from_json(r#"{"json": true, "filter": "mdcflow=debug"}"#).unwrap();
        assert_eq!(
            config,
            LoggingConfig::new().with_json(true).with_filter("mdcflow=debug")
        );
        assert!(LoggingConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("mdcflow=debug,info").is_ok());
        let err = parse_filter("mdcflow=verbose").unwrap_err();
        assert!(matches!(err, MdcflowError::Logging(_)));
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig::new().with_filter("warn");
        let _ = init_logging_with_store(&config, ContextStore::new());
        let again = init_logging_with_store(&config, ContextStore::new());
        assert!(matches!(again, Err(MdcflowError::Logging(_))));
    }
}
