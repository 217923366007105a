//! ServiceAdapter trait - DispatchEngine output interface
//!
//! Defines the capability set every target service exposes to the engine.

use bytes::Bytes;

use crate::{Batch, BatchLimits, EncodedRecord, FailureReason, Outcome, Record, RecordId};

/// Batch-send capability of one AWS service.
///
/// All adapter implementations must implement this trait. The engine never
/// branches on the concrete service; it only reads `limits()` and the
/// `retryable` flag of the returned outcomes.
#[trait_variant::make(ServiceAdapter: Send)]
pub trait LocalServiceAdapter {
    /// Adapter name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Batch contract of the underlying call
    fn limits(&self) -> BatchLimits;

    /// Encode one record into its wire body, rejecting records the service
    /// would refuse. Runs once per record per dispatch, before batching.
    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        encode_json(record)
    }

    /// Encode one record into the entry the batcher sizes and `send` receives.
    ///
    /// Adapters whose service charges more than the body against its limits
    /// override this to fix that extra wire data here and record it as
    /// overhead.
    fn encode_entry(&self, id: RecordId, record: &Record) -> Result<EncodedRecord, FailureReason> {
        self.encode(record)
            .map(|body| EncodedRecord::new(id, body, record))
    }

    /// Send one batch with a single service call.
    ///
    /// Must return exactly one outcome per entry. A call that fails as a whole
    /// is reported as a failure outcome for every entry, never as an error.
    async fn send(&self, batch: &Batch) -> Vec<Outcome>;
}

/// Compact JSON encoding of a record's payload
pub fn encode_json(record: &Record) -> Result<Bytes, FailureReason> {
    serde_json::to_vec(&record.payload)
        .map(Bytes::from)
        .map_err(|e| FailureReason::validation("SerializationError", e.to_string()))
}
