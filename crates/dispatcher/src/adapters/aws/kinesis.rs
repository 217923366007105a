//! `StreamApi` over `aws_sdk_kinesis`

use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use aws_sdk_kinesis::Client;

use super::sdk_error;
use crate::adapters::{ServiceCallError, StreamApi, StreamEntry, StreamEntryResult};

impl StreamApi for Client {
    /// `stream` is a stream name or a stream ARN
    async fn put_batch(
        &self,
        stream: &str,
        entries: Vec<StreamEntry>,
    ) -> Result<Vec<StreamEntryResult>, ServiceCallError> {
        let records = entries
            .into_iter()
            .map(|e| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(e.data.to_vec()))
                    .partition_key(e.partition_key)
                    .build()
                    .map_err(|err| ServiceCallError::service("InvalidBatchEntry", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = self.put_records().set_records(Some(records));
        let request = if stream.starts_with("arn:") {
            request.stream_arn(stream)
        } else {
            request.stream_name(stream)
        };
        let output = request.send().await.map_err(sdk_error)?;

        Ok(output
            .records()
            .iter()
            .map(|r| StreamEntryResult {
                error_code: r.error_code().map(str::to_string),
                error_message: r.error_message().map(str::to_string),
            })
            .collect())
    }
}
