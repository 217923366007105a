//! Batcher - groups encoded records into service-sized batches
//!
//! Greedy first-fit-sequential packing: records keep their input order, a new
//! batch starts when the next record would break the item count or the byte
//! budget of the current one.

use thiserror::Error;

use contracts::{Batch, BatchLimits, EncodedRecord, FailureReason, RecordId};

/// Batching errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// Limits cannot produce a non-empty batch
    #[error("invalid batch limits: {message}")]
    InvalidLimits { message: String },

    /// A record can never fit in a batch
    #[error("record {record_id} is {size} bytes, limit is {limit} bytes")]
    OversizeRecord {
        record_id: RecordId,
        size: usize,
        limit: usize,
    },
}

/// Partitions records under fixed limits
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    limits: BatchLimits,
}

impl Batcher {
    /// Create a batcher, rejecting limits that cannot hold a single record
    pub fn new(limits: BatchLimits) -> Result<Self, BatchError> {
        limits.validate().map_err(|e| BatchError::InvalidLimits {
            message: e.to_string(),
        })?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// Split records into batches.
    ///
    /// Fails without producing any batch if one record exceeds the per-record
    /// limit. Deterministic: the same input always yields the same batches.
    pub fn partition(&self, records: Vec<EncodedRecord>) -> Result<Vec<Batch>, BatchError> {
        let limit = self.limits.record_limit();
        if let Some(record) = records.iter().find(|r| r.size() > limit) {
            return Err(BatchError::OversizeRecord {
                record_id: record.id,
                size: record.size(),
                limit,
            });
        }
        Ok(self.pack(records))
    }

    /// Separate records that can never be sent from the rest.
    ///
    /// Returns `(sendable, oversize)`; both keep input order.
    pub fn split_oversize(
        &self,
        records: Vec<EncodedRecord>,
    ) -> (Vec<EncodedRecord>, Vec<(EncodedRecord, FailureReason)>) {
        let limit = self.limits.record_limit();
        let mut sendable = Vec::with_capacity(records.len());
        let mut oversize = Vec::new();
        for record in records {
            if record.size() > limit {
                let reason = FailureReason::OversizeRecord {
                    size: record.size(),
                    limit,
                };
                oversize.push((record, reason));
            } else {
                sendable.push(record);
            }
        }
        (sendable, oversize)
    }

    /// Pack records already known to fit
    pub(crate) fn pack(&self, records: Vec<EncodedRecord>) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current: Vec<EncodedRecord> = Vec::new();
        let mut current_bytes = 0usize;

        for record in records {
            let size = record.size();
            let full = current.len() >= self.limits.max_items
                || current_bytes + size > self.limits.max_batch_bytes;
            if !current.is_empty() && full {
                batches.push(Batch::new(std::mem::take(&mut current)));
                current_bytes = 0;
            }
            current_bytes += size;
            current.push(record);
        }
        if !current.is_empty() {
            batches.push(Batch::new(current));
        }
        batches
    }
}

/// Partition records under `limits`
pub fn partition(
    records: Vec<EncodedRecord>,
    limits: BatchLimits,
) -> Result<Vec<Batch>, BatchError> {
    Batcher::new(limits)?.partition(records)
}
