//! Service adapters
//!
//! One adapter per AWS batch call. Each adapter is generic over a thin client
//! trait that exposes the raw response shape of its call, so the same
//! normalisation runs against the AWS SDK (`aws` feature) and against the
//! scripted clients in [`mock`].

mod message;
pub mod mock;
mod object;
mod queue;
mod stream;
mod table;
mod topic;

#[cfg(feature = "aws")]
pub mod aws;

use thiserror::Error;
use tracing::warn;

use contracts::{Batch, Outcome};

pub use message::{BatchEntryError, IdBatchResponse, MessageEntry};
pub use object::{ObjectAdapter, ObjectApi};
pub use queue::{QueueAdapter, QueueApi};
pub use stream::{RecordFraming, StreamAdapter, StreamApi, StreamEntry, StreamEntryResult};
pub use table::{TableAdapter, TableApi, TableItem};
pub use topic::{TopicAdapter, TopicApi};

/// Call-level error codes that will fail again no matter how often the
/// batch is retried
const FATAL_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AuthorizationError",
    "BatchEntryIdsNotDistinct",
    "BatchRequestTooLong",
    "EmptyBatchRequest",
    "InvalidArgumentException",
    "InvalidAccessKeyId",
    "InvalidBatchEntry",
    "InvalidBatchEntryId",
    "InvalidClientTokenId",
    "InvalidItem",
    "KMSAccessDeniedException",
    "KMSDisabledException",
    "KMSNotFoundException",
    "NoSuchBucket",
    "NotFound",
    "NotFoundException",
    "ResourceNotFoundException",
    "SignatureDoesNotMatch",
    "TooManyEntriesInBatchRequest",
    "UnrecognizedClientException",
    "ValidationException",
    "AWS.SimpleQueueService.NonExistentQueue",
    "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
    "AWS.SimpleQueueService.BatchRequestTooLong",
    "AWS.SimpleQueueService.EmptyBatchRequest",
    "AWS.SimpleQueueService.InvalidBatchEntryId",
    "AWS.SimpleQueueService.TooManyEntriesInBatchRequest",
    "AWS.SimpleQueueService.UnsupportedOperation",
];

/// A service call that failed as a whole
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceCallError {
    /// Service error code, or `TransportError` when no response arrived
    pub code: String,
    pub message: String,
    /// Network, timeout or dispatch failure rather than a service response
    pub transport: bool,
}

impl ServiceCallError {
    /// Error returned by the service
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            transport: false,
        }
    }

    /// No usable response (connection, timeout, dispatch failure)
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: "TransportError".to_string(),
            message: message.into(),
            transport: true,
        }
    }

    /// Whether retrying the same call cannot succeed
    pub fn is_fatal(&self) -> bool {
        !self.transport
            && (FATAL_CODES.contains(&self.code.as_str()) || self.code.starts_with("InvalidParameter"))
    }
}

/// One outcome per entry for a call that failed as a whole
pub(crate) fn whole_batch_failure(
    adapter: &str,
    batch: &Batch,
    err: &ServiceCallError,
    retryable: bool,
) -> Vec<Outcome> {
    warn!(
        adapter,
        code = %err.code,
        entries = batch.len(),
        retryable,
        error = %err.message,
        "batch call failed"
    );
    batch
        .record_ids()
        .into_iter()
        .map(|id| {
            if retryable {
                Outcome::transient(id, err.code.clone(), err.message.clone())
            } else {
                Outcome::rejected(id, err.code.clone(), err.message.clone())
            }
        })
        .collect()
}
