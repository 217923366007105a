//! TopicAdapter - SNS `PublishBatch`

use std::future::Future;

use bytes::Bytes;
use tracing::instrument;

use contracts::{encode_json, Batch, BatchLimits, FailureReason, Outcome, Record, ServiceAdapter, ServiceKind};

use super::message::{check_group_key, correlate, message_entries};
use super::{whole_batch_failure, IdBatchResponse, MessageEntry, ServiceCallError};

/// SNS batch publish capability
pub trait TopicApi: Send + Sync {
    /// Publish up to ten messages to a topic
    fn send_batch(
        &self,
        topic_arn: &str,
        entries: Vec<MessageEntry>,
    ) -> impl Future<Output = Result<IdBatchResponse, ServiceCallError>> + Send;
}

/// Publishes records to one SNS topic
pub struct TopicAdapter<C> {
    client: C,
    topic_arn: String,
    limits: BatchLimits,
    fifo: bool,
}

impl<C: TopicApi> TopicAdapter<C> {
    /// Adapter with the SNS preset limits; `.fifo` topics are detected from the ARN
    pub fn new(client: C, topic_arn: impl Into<String>) -> Self {
        let topic_arn = topic_arn.into();
        Self {
            client,
            fifo: topic_arn.ends_with(".fifo"),
            topic_arn,
            limits: ServiceKind::Sns.default_limits(),
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: TopicApi> ServiceAdapter for TopicAdapter<C> {
    fn name(&self) -> &str {
        ServiceKind::Sns.as_str()
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        check_group_key(self.fifo, record)?;
        encode_json(record)
    }

    #[instrument(
        name = "topic_adapter_send",
        skip(self, batch),
        fields(topic = %self.topic_arn, entries = batch.len())
    )]
    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        match self
            .client
            .send_batch(&self.topic_arn, message_entries(batch))
            .await
        {
            Ok(response) => correlate(self.name(), batch, response),
            Err(err) => whole_batch_failure(self.name(), batch, &err, !err.is_fatal()),
        }
    }
}
