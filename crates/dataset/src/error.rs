//! Dataset error types

use std::path::PathBuf;
use thiserror::Error;

/// Dataset error
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Dataset file could not be read or written
    #[error("dataset io error at {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dataset is not valid JSON
    #[error("failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    /// Top-level value is not an array
    #[error("invalid dataset: expected a JSON array, found {found}")]
    NotAnArray {
        /// JSON type that was found
        found: &'static str,
    },

    /// An element is not a JSON object
    #[error("invalid dataset: element {index} is {found}, expected an object")]
    NotAnObject {
        /// Element index
        index: usize,
        /// JSON type that was found
        found: &'static str,
    },
}

/// Dataset Result type alias
pub type Result<T> = std::result::Result<T, DatasetError>;
