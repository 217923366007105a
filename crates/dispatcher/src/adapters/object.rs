//! ObjectAdapter - S3 `PutObject`, one JSON-lines object per batch

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tracing::{debug, instrument};

use contracts::{encode_json, Batch, BatchLimits, FailureReason, Outcome, Record, ServiceAdapter, ServiceKind};

use super::{whole_batch_failure, ServiceCallError};

const RETRYABLE_CODES: &[&str] = &[
    "SlowDown",
    "InternalError",
    "ServiceUnavailable",
    "RequestTimeout",
];

/// Object store put capability
pub trait ObjectApi: Send + Sync {
    /// Write one object
    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<(), ServiceCallError>> + Send;
}

/// Writes each batch as one newline-delimited JSON object.
///
/// Keys look like `{prefix}{yyyy/mm/dd}/{run_id}-{seq:06}.jsonl`; a retried
/// batch is written under a fresh key.
pub struct ObjectAdapter<C> {
    client: C,
    bucket: String,
    prefix: String,
    run_id: String,
    sequence: AtomicU64,
    limits: BatchLimits,
}

impl<C: ObjectApi> ObjectAdapter<C> {
    pub fn new(client: C, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: String::new(),
            run_id: Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string(),
            sequence: AtomicU64::new(0),
            limits: ServiceKind::S3.default_limits(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn next_key(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}{}/{}-{:06}.jsonl",
            self.prefix,
            Utc::now().format("%Y/%m/%d"),
            self.run_id,
            seq
        )
    }
}

impl<C: ObjectApi> ServiceAdapter for ObjectAdapter<C> {
    fn name(&self) -> &str {
        ServiceKind::S3.as_str()
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        let body = encode_json(record)?;
        let mut line = BytesMut::with_capacity(body.len() + 1);
        line.extend_from_slice(&body);
        line.extend_from_slice(b"\n");
        Ok(line.freeze())
    }

    #[instrument(
        name = "object_adapter_send",
        skip(self, batch),
        fields(bucket = %self.bucket, entries = batch.len())
    )]
    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        let key = self.next_key();
        let mut body = BytesMut::with_capacity(batch.total_bytes());
        for entry in batch.entries() {
            body.extend_from_slice(&entry.body);
        }

        match self.client.write_object(&self.bucket, &key, body.freeze()).await {
            Ok(()) => {
                debug!(key = %key, "object written");
                batch.record_ids().into_iter().map(Outcome::success).collect()
            }
            Err(err) => {
                let retryable = err.transport || RETRYABLE_CODES.contains(&err.code.as_str());
                whole_batch_failure(self.name(), batch, &err, retryable)
            }
        }
    }
}
