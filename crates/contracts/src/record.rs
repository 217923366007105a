//! Record - the unit of delivery
//!
//! A JSON payload plus optional delivery metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a record in the input dataset.
///
/// Stays the same across retries; the engine settles each id exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub usize);

impl RecordId {
    /// Underlying index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JSON-serializable record with optional delivery metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record body
    pub payload: serde_json::Value,

    /// Deduplication key (SQS/SNS FIFO `MessageDeduplicationId`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,

    /// Grouping key (SQS/SNS FIFO `MessageGroupId`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,

    /// Partition key (Kinesis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

impl Record {
    /// Create a record without delivery metadata
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            dedupe_key: None,
            group_key: None,
            partition_key: None,
        }
    }

    /// Set the deduplication key
    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    /// Set the grouping key
    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Set the partition key
    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }
}

impl From<serde_json::Value> for Record {
    fn from(payload: serde_json::Value) -> Self {
        Self::new(payload)
    }
}

/// A record encoded for one adapter, ready for batching.
///
/// `body` is what goes on the wire. `size()` is what the batch limits are
/// checked against: the body plus any bytes the service charges on top of it
/// (a Kinesis partition key). Cloning only bumps the `Bytes` refcount.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub id: RecordId,
    pub body: Bytes,
    pub dedupe_key: Option<String>,
    pub group_key: Option<String>,
    pub partition_key: Option<String>,
    /// Bytes counted against the limits besides `body`
    pub overhead: usize,
}

impl EncodedRecord {
    /// Pair an encoded body with the record's metadata
    pub fn new(id: RecordId, body: Bytes, record: &Record) -> Self {
        Self {
            id,
            body,
            dedupe_key: record.dedupe_key.clone(),
            group_key: record.group_key.clone(),
            partition_key: record.partition_key.clone(),
            overhead: 0,
        }
    }

    /// Charge `bytes` of extra wire size to this record
    pub fn with_overhead(mut self, bytes: usize) -> Self {
        self.overhead = bytes;
        self
    }

    /// Size in bytes as the service counts it
    #[inline]
    pub fn size(&self) -> usize {
        self.body.len() + self.overhead
    }

    /// Body as UTF-8 text (JSON encodings are always valid UTF-8)
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
