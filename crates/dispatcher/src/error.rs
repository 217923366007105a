//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors.
///
/// Only raised while building an engine or an adapter; a running dispatch
/// reports per-record failures in its `DispatchReport` instead.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Adapter limits cannot produce a batch
    #[error("invalid batch limits for adapter '{adapter}': {source}")]
    InvalidLimits {
        adapter: String,
        #[source]
        source: crate::batcher::BatchError,
    },

    /// Engine configuration error
    #[error("invalid engine config at '{field}': {message}")]
    InvalidConfig { field: String, message: String },

    /// Adapter creation error
    #[error("failed to create adapter '{name}': {message}")]
    AdapterCreation { name: String, message: String },
}

impl DispatcherError {
    /// Create an engine config error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an adapter creation error
    pub fn adapter_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
