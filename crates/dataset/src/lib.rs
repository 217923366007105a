//! # Dataset
//!
//! JSON datasets: a top-level array of objects, loaded from a file or built in
//! memory.
//!
//! Responsibilities:
//! - Validate the dataset shape (array of objects)
//! - Record size statistics and the services able to accept them
//! - Conversion into dispatch `Record`s, lifting delivery keys out of payload fields
//!
//! ## Usage Example
//!
//! ```ignore
//! use dataset::JsonDataset;
//!
//! let dataset = JsonDataset::load("events.json")?;
//! println!("{} records, largest {} bytes", dataset.len(), dataset.max_record_size());
//! let records = dataset.into_records(&blueprint.dataset);
//! ```

mod error;

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{DatasetFields, Record, ServiceKind};
use serde_json::Value;
use tracing::{debug, info};

pub use error::{DatasetError, Result};

/// A validated JSON dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonDataset {
    data: Vec<Value>,
    path: Option<PathBuf>,
}

impl JsonDataset {
    /// Build a dataset from in-memory values, rejecting non-object elements
    pub fn from_records(data: Vec<Value>) -> Result<Self> {
        validate_elements(&data)?;
        Ok(Self { data, path: None })
    }

    /// Parse a dataset from JSON text
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        match value {
            Value::Array(data) => Self::from_records(data),
            other => Err(DatasetError::NotAnArray {
                found: type_name(&other),
            }),
        }
    }

    /// Load a dataset file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut dataset = Self::parse(&content)?;
        dataset.path = Some(path.to_path_buf());
        info!(path = %path.display(), records = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Write the dataset as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(path, content).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), records = self.len(), "dataset saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw records
    pub fn records(&self) -> &[Value] {
        &self.data
    }

    /// File the dataset was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Compact JSON size of every record, sorted
    pub fn record_sizes(&self, ascending: bool) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.data.iter().map(record_size).collect();
        if ascending {
            sizes.sort_unstable();
        } else {
            sizes.sort_unstable_by(|a, b| b.cmp(a));
        }
        sizes
    }

    /// Size of the largest record (0 for an empty dataset)
    pub fn max_record_size(&self) -> usize {
        self.data.iter().map(record_size).max().unwrap_or(0)
    }

    /// Services whose per-record limit accepts every record in the dataset
    pub fn available_services(&self) -> Vec<ServiceKind> {
        ServiceKind::accepting(self.max_record_size())
    }

    /// Convert into dispatch records, lifting configured key fields
    pub fn into_records(self, fields: &DatasetFields) -> Vec<Record> {
        self.data
            .into_iter()
            .map(|payload| {
                let dedupe_key = lift_key(&payload, fields.dedupe_key_field.as_deref());
                let group_key = lift_key(&payload, fields.group_key_field.as_deref());
                let partition_key = lift_key(&payload, fields.partition_key_field.as_deref());
                Record {
                    payload,
                    dedupe_key,
                    group_key,
                    partition_key,
                }
            })
            .collect()
    }
}

/// Compact JSON size of a value in bytes
pub fn record_size(value: &Value) -> usize {
    // Serializing a `Value` cannot fail
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

fn validate_elements(data: &[Value]) -> Result<()> {
    for (index, value) in data.iter().enumerate() {
        if !value.is_object() {
            return Err(DatasetError::NotAnObject {
                index,
                found: type_name(value),
            });
        }
    }
    Ok(())
}

/// Strings are used as-is, numbers and booleans are stringified, anything else is ignored
fn lift_key(payload: &Value, field: Option<&str>) -> Option<String> {
    match payload.get(field?)? {
        Value::String(s) => Some(s.clone()),
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
