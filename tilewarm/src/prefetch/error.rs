//! Error types for the prefetch module.

use thiserror::Error;

/// Errors that can occur while configuring or building the prefetch engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrefetchError {
    /// A configuration value is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// No Tokio runtime was available to run warm requests on.
    #[error("Prefetch engine requires a Tokio runtime")]
    NoRuntime,
}

impl PrefetchError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
