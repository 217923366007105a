//! `TopicApi` over `aws_sdk_sns`

use aws_sdk_sns::types::PublishBatchRequestEntry;
use aws_sdk_sns::Client;

use super::sdk_error;
use crate::adapters::{BatchEntryError, IdBatchResponse, MessageEntry, ServiceCallError, TopicApi};

impl TopicApi for Client {
    async fn send_batch(
        &self,
        topic_arn: &str,
        entries: Vec<MessageEntry>,
    ) -> Result<IdBatchResponse, ServiceCallError> {
        let entries = entries
            .into_iter()
            .map(|e| {
                PublishBatchRequestEntry::builder()
                    .id(e.id)
                    .message(e.body)
                    .set_message_deduplication_id(e.dedupe_id)
                    .set_message_group_id(e.group_id)
                    .build()
                    .map_err(|err| ServiceCallError::service("InvalidBatchEntry", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .publish_batch()
            .topic_arn(topic_arn)
            .set_publish_batch_request_entries(Some(entries))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(IdBatchResponse {
            successful: output
                .successful()
                .iter()
                .filter_map(|s| s.id().map(str::to_string))
                .collect(),
            failed: output
                .failed()
                .iter()
                .map(|f| BatchEntryError {
                    id: f.id().to_string(),
                    code: f.code().to_string(),
                    message: f.message().map(str::to_string),
                    sender_fault: f.sender_fault(),
                })
                .collect(),
        })
    }
}
