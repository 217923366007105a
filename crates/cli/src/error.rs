//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Dataset file not found
    #[error("Dataset file not found: {path}")]
    InputNotFound { path: String },

    /// Binary built without AWS clients
    #[error("awsjson was built without the `aws` feature; only --dry-run is available")]
    AwsSupportDisabled,

    /// Some records were not delivered
    #[error("{failed} of {total} records were not delivered")]
    DeliveryIncomplete { failed: usize, total: usize },

    /// Dispatch stopped by a shutdown signal
    #[error("Dispatch cancelled after {attempts} attempt(s); {failed} of {total} records not delivered")]
    Cancelled {
        attempts: u32,
        failed: usize,
        total: usize,
    },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn input_not_found(path: &Path) -> Self {
        Self::InputNotFound {
            path: path.display().to_string(),
        }
    }
}
