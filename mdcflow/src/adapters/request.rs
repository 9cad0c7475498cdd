//! Seeds the context at the start of an inbound request.

use crate::context::{ContextSnapshot, ContextStore};
use crate::errors::{ContextError, ContextResult, MdcflowError};
use crate::scope::{DisposalPolicy, ScopedExecution};
use crate::task::ContextFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::debug;
use uuid::Uuid;

/// The parts of an inbound request used to enrich the context.
#[cfg_attr(test, mockall::automock)]
pub trait InboundRequest {
    /// Request method, e.g. `GET`.
    fn method(&self) -> String;

    /// Request path.
    fn path(&self) -> String;

    /// Raw query string, if the request has one.
    fn query(&self) -> Option<String>;
}

/// Layout of generated request identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestIdFormat {
    /// Random UUID v4.
    #[default]
    V4,
    /// Time-ordered UUID v7.
    V7,
}

impl RequestIdFormat {
    fn generate(self) -> String {
        match self {
            Self::V4 => Uuid::new_v4(),
            Self::V7 => Uuid::now_v7(),
        }
        .to_string()
    }
}

/// Configuration for [`RequestContextFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContextConfig {
    /// Key holding the correlation identifier.
    pub request_id_key: String,
    /// Generate an identifier when none is present.
    pub generate_missing: bool,
    /// Format of generated identifiers.
    pub id_format: RequestIdFormat,
    /// Add method, path and query to the context.
    pub enrich: bool,
    /// Key for the request method.
    pub method_key: String,
    /// Key for the request path.
    pub path_key: String,
    /// Key for the query string.
    pub query_key: String,
    /// What happens to the handling unit's storage afterwards.
    pub disposal: DisposalPolicy,
}

impl Default for RequestContextConfig {
    fn default() -> Self {
        Self {
            request_id_key: "requestId".to_string(),
            generate_missing: true,
            id_format: RequestIdFormat::default(),
            enrich: true,
            method_key: "method".to_string(),
            path_key: "path".to_string(),
            query_key: "query".to_string(),
            disposal: DisposalPolicy::default(),
        }
    }
}

impl RequestContextConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correlation identifier key.
    #[must_use]
    pub fn with_request_id_key(mut self, key: impl Into<String>) -> Self {
        self.request_id_key = key.into();
        self
    }

    /// Enables or disables identifier generation.
    #[must_use]
    pub fn with_generate_missing(mut self, generate: bool) -> Self {
        self.generate_missing = generate;
        self
    }

    /// Sets the generated identifier format.
    #[must_use]
    pub fn with_id_format(mut self, format: RequestIdFormat) -> Self {
        self.id_format = format;
        self
    }

    /// Enables or disables request metadata enrichment.
    #[must_use]
    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    /// Sets the disposal policy for the handling unit.
    #[must_use]
    pub fn with_disposal(mut self, disposal: DisposalPolicy) -> Self {
        self.disposal = disposal;
        self
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `MdcflowError::Config` if the JSON is malformed or a key
    /// is empty.
    pub fn from_json(json: &str) -> Result<Self, MdcflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every configured key is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `MdcflowError::Config` naming the first empty key.
    pub fn validate(&self) -> Result<(), MdcflowError> {
        let keys = [
            ("request_id_key", &self.request_id_key),
            ("method_key", &self.method_key),
            ("path_key", &self.path_key),
            ("query_key", &self.query_key),
        ];
        match keys.iter().find(|(_, key)| key.is_empty()) {
            Some((name, _)) => Err(MdcflowError::Config(format!("{name} cannot be empty"))),
            None => Ok(()),
        }
    }
}

/// Installs a per-request context around a downstream handler.
///
/// The handler runs with the caller's context plus a correlation
/// identifier and, optionally, the request's method, path and query.
/// Whatever the handler's outcome, the handling unit gets back exactly the
/// context it had before.
#[derive(Debug, Clone)]
pub struct RequestContextFilter {
    config: RequestContextConfig,
    scope: ScopedExecution,
}

impl RequestContextFilter {
    /// Creates a filter over `store`.
    #[must_use]
    pub fn new(store: ContextStore, config: RequestContextConfig) -> Self {
        let scope = ScopedExecution::new(store, config.disposal);
        Self { config, scope }
    }

    /// Returns the filter configuration.
    #[must_use]
    pub fn config(&self) -> &RequestContextConfig {
        &self.config
    }

    /// Returns the request identifier in the current unit's context.
    #[must_use]
    pub fn current_request_id(&self) -> Option<String> {
        self.scope.store().get(&self.config.request_id_key).ok().flatten()
    }

    /// Runs `proceed` under the request context and returns its output.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidArgument` if a configured key is empty.
    /// `proceed` is not called in that case.
    pub fn handle<R, F>(&self, request: &(impl InboundRequest + ?Sized), proceed: F) -> ContextResult<R>
    where
        F: FnOnce() -> R,
    {
        let seeded = self.seed(self.scope.store().snapshot(), request)?;
        Ok(self.scope.run(&seeded, proceed))
    }

    /// Async form of [`handle`](Self::handle).
    ///
    /// The request context travels with the returned future; the polling
    /// unit's own context is never modified.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidArgument` if a configured key is empty.
    pub async fn handle_async<Fut, F>(
        &self,
        request: &(impl InboundRequest + ?Sized),
        proceed: F,
    ) -> ContextResult<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let seeded = self.seed(self.scope.store().snapshot(), request)?;
        Ok(ContextFuture::new(proceed(), seeded, self.scope.clone()).await)
    }

    fn seed(
        &self,
        base: ContextSnapshot,
        request: &(impl InboundRequest + ?Sized),
    ) -> ContextResult<ContextSnapshot> {
        let config = &self.config;
        let mut seeded = base;

        if config.generate_missing {
            check_key(&config.request_id_key)?;
            if !seeded.contains_key(&config.request_id_key) {
                seeded = seeded.with_entry(&config.request_id_key, config.id_format.generate());
            }
        }

        if config.enrich {
            check_key(&config.method_key)?;
            check_key(&config.path_key)?;
            seeded = seeded
                .with_entry(&config.method_key, request.method())
                .with_entry(&config.path_key, request.path());
            if let Some(query) = request.query().filter(|q| !q.is_empty()) {
                check_key(&config.query_key)?;
                seeded = seeded.with_entry(&config.query_key, query);
            }
        }

        debug!(
            request_id = seeded.get(&config.request_id_key).unwrap_or_default(),
            keys = seeded.len(),
            "Seeded request context"
        );
        Ok(seeded)
    }
}

impl Default for RequestContextFilter {
    fn default() -> Self {
        Self::new(ContextStore::global().clone(), RequestContextConfig::default())
    }
}

fn check_key(key: &str) -> ContextResult<()> {
    if key.is_empty() {
        return Err(ContextError::empty_key());
    }
    Ok(())
}
