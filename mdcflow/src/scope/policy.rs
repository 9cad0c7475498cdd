//! Disposal policy and propagation configuration.

use serde::{Deserialize, Serialize};

/// What happens to a unit's context storage once propagated work finishes.
///
/// The component that owns the pooling decision picks the policy; it is
/// never inferred from the running thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalPolicy {
    /// Keep the unit's storage allocated. Right for dedicated threads whose
    /// context lives as long as they do.
    #[default]
    Retain,
    /// Release the unit's storage after the work, provided the restored
    /// context is empty. Right for pooled or per-task threads.
    ///
    /// A non-empty restored context suppresses disposal: work run inline on
    /// a thread that has its own context leaves that context allocated.
    Dispose,
}

impl DisposalPolicy {
    /// Returns true if storage is released after each task.
    #[must_use]
    pub fn disposes(self) -> bool {
        matches!(self, Self::Dispose)
    }

    /// Returns whichever of the two policies releases storage.
    #[must_use]
    pub fn stricter(self, other: Self) -> Self {
        if self.disposes() || other.disposes() {
            Self::Dispose
        } else {
            Self::Retain
        }
    }
}

impl std::fmt::Display for DisposalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retain => write!(f, "retain"),
            Self::Dispose => write!(f, "dispose"),
        }
    }
}

/// Configuration for a propagating executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Disposal policy applied on the worker after each task.
    #[serde(default)]
    pub disposal: DisposalPolicy,
}

impl PropagationConfig {
    /// Creates a configuration with the default `Retain` policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for pooled or per-task workers.
    #[must_use]
    pub fn pooled() -> Self {
        Self::new().with_disposal(DisposalPolicy::Dispose)
    }

    /// Sets the disposal policy.
    #[must_use]
    pub fn with_disposal(mut self, disposal: DisposalPolicy) -> Self {
        self.disposal = disposal;
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, crate::errors::MdcflowError> {
        Ok(serde_json::from_str(json)?)
    }
}
