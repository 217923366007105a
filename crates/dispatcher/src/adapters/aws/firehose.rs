//! `StreamApi` over `aws_sdk_firehose`

use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::Record;
use aws_sdk_firehose::Client;

use super::sdk_error;
use crate::adapters::{ServiceCallError, StreamApi, StreamEntry, StreamEntryResult};

impl StreamApi for Client {
    /// Firehose has no partition keys; `partition_key` is ignored
    async fn put_batch(
        &self,
        stream: &str,
        entries: Vec<StreamEntry>,
    ) -> Result<Vec<StreamEntryResult>, ServiceCallError> {
        let records = entries
            .into_iter()
            .map(|e| {
                Record::builder()
                    .data(Blob::new(e.data.to_vec()))
                    .build()
                    .map_err(|err| ServiceCallError::service("InvalidBatchEntry", err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .put_record_batch()
            .delivery_stream_name(stream)
            .set_records(Some(records))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(output
            .request_responses()
            .iter()
            .map(|r| StreamEntryResult {
                error_code: r.error_code().map(str::to_string),
                error_message: r.error_message().map(str::to_string),
            })
            .collect())
    }
}
