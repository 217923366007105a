//! `ObjectApi` over `aws_sdk_s3`

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::sdk_error;
use crate::adapters::{ObjectApi, ServiceCallError};

impl ObjectApi for Client {
    async fn write_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ServiceCallError> {
        self.put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/x-ndjson")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
