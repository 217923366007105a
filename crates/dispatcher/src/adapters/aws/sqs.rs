//! `QueueApi` over `aws_sdk_sqs`

use aws_sdk_sqs::types::SendMessageBatchRequestEntry;
use aws_sdk_sqs::Client;

use super::sdk_error;
use crate::adapters::{BatchEntryError, IdBatchResponse, MessageEntry, QueueApi, ServiceCallError};

impl QueueApi for Client {
    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<MessageEntry>,
    ) -> Result<IdBatchResponse, ServiceCallError> {
        let entries = entries
            .into_iter()
            .map(|e| {
                SendMessageBatchRequestEntry::builder()
                    .id(e.id)
                    .message_body(e.body)
                    .set_message_deduplication_id(e.dedupe_id)
                    .set_message_group_id(e.group_id)
                    .build()
                    .map_err(|err| ServiceCallError::service("InvalidBatchEntry", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(IdBatchResponse {
            successful: output.successful().iter().map(|s| s.id().to_string()).collect(),
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
