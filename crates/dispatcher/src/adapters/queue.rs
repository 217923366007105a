//! QueueAdapter - SQS `SendMessageBatch`

use std::future::Future;

use bytes::Bytes;
use tracing::instrument;

use contracts::{encode_json, Batch, BatchLimits, FailureReason, Outcome, Record, ServiceAdapter, ServiceKind};

use super::message::{check_group_key, correlate, message_entries};
use super::{whole_batch_failure, IdBatchResponse, MessageEntry, ServiceCallError};

/// SQS batch send capability
pub trait QueueApi: Send + Sync {
    /// Send up to ten messages to a queue
    fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<MessageEntry>,
    ) -> impl Future<Output = Result<IdBatchResponse, ServiceCallError>> + Send;
}

/// Delivers records as messages to one SQS queue
pub struct QueueAdapter<C> {
    client: C,
    queue_url: String,
    limits: BatchLimits,
    fifo: bool,
}

impl<C: QueueApi> QueueAdapter<C> {
    /// Adapter with the SQS preset limits; `.fifo` queues are detected from the URL
    pub fn new(client: C, queue_url: impl Into<String>) -> Self {
        let queue_url = queue_url.into();
        Self {
            client,
            fifo: queue_url.ends_with(".fifo"),
            queue_url,
            limits: ServiceKind::Sqs.default_limits(),
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn is_fifo(&self) -> bool {
        self.fifo
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: QueueApi> ServiceAdapter for QueueAdapter<C> {
    fn name(&self) -> &str {
        ServiceKind::Sqs.as_str()
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        check_group_key(self.fifo, record)?;
        encode_json(record)
    }

    #[instrument(
        name = "queue_adapter_send",
        skip(self, batch),
        fields(queue = %self.queue_url, entries = batch.len())
    )]
    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        match self
            .client
            .send_batch(&self.queue_url, message_entries(batch))
            .await
        {
            Ok(response) => correlate(self.name(), batch, response),
            Err(err) => whole_batch_failure(self.name(), batch, &err, !err.is_fatal()),
        }
    }
}
