//! Batch - a bounded group of records sent in one service call

use serde::{Deserialize, Serialize};

use crate::{ContractError, EncodedRecord, RecordId};

/// Batch contract of one service call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum entries per call, must be >= 1
    pub max_items: usize,

    /// Maximum summed entry size per call (bytes)
    pub max_batch_bytes: usize,

    /// Maximum size of a single entry (bytes)
    pub max_record_bytes: usize,
}

impl BatchLimits {
    /// Create limits
    pub const fn new(max_items: usize, max_batch_bytes: usize, max_record_bytes: usize) -> Self {
        Self {
            max_items,
            max_batch_bytes,
            max_record_bytes,
        }
    }

    /// Effective per-record limit: a record must also fit in a batch on its own
    #[inline]
    pub fn record_limit(&self) -> usize {
        self.max_record_bytes.min(self.max_batch_bytes)
    }

    /// Check the limits can produce at least one non-empty batch
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.max_items == 0 {
            return Err(ContractError::config_validation(
                "limits.max_items",
                "max_items must be >= 1",
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(ContractError::config_validation(
                "limits.max_batch_bytes",
                "max_batch_bytes must be >= 1",
            ));
        }
        if self.max_record_bytes == 0 {
            return Err(ContractError::config_validation(
                "limits.max_record_bytes",
                "max_record_bytes must be >= 1",
            ));
        }
        Ok(())
    }
}

/// An ordered group of encoded records.
///
/// The position of an entry is its batch-local sequence id (`0..len`); adapters
/// use it as the per-entry id on the wire and to correlate results back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    entries: Vec<EncodedRecord>,
}

impl Batch {
    /// Create a batch from already-bounded entries
    pub fn new(entries: Vec<EncodedRecord>) -> Self {
        Self { entries }
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of entry sizes in bytes
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(EncodedRecord::size).sum()
    }

    /// Entries in sequence order
    pub fn entries(&self) -> &[EncodedRecord] {
        &self.entries
    }

    /// Entry at a batch-local sequence id
    pub fn get(&self, seq: usize) -> Option<&EncodedRecord> {
        self.entries.get(seq)
    }

    /// Resolve a wire-level entry id (the decimal sequence id) to its entry
    pub fn entry_by_wire_id(&self, wire_id: &str) -> Option<&EncodedRecord> {
        wire_id.parse::<usize>().ok().and_then(|seq| self.get(seq))
    }

    /// `(sequence id, entry)` pairs
    pub fn iter_seq(&self) -> impl Iterator<Item = (usize, &EncodedRecord)> {
        self.entries.iter().enumerate()
    }

    /// Ids of the records in this batch, in order
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Take the entries back
    pub fn into_entries(self) -> Vec<EncodedRecord> {
        self.entries
    }
}
