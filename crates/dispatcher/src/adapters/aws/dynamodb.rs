//! `TableApi` over `aws_sdk_dynamodb`

use std::collections::HashMap;

use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use serde_dynamo::to_item;

use super::sdk_error;
use crate::adapters::{ServiceCallError, TableApi, TableItem};

type Item = HashMap<String, AttributeValue>;

impl TableApi for Client {
    /// Unprocessed items come back as attribute maps; they are matched to the
    /// request by value to recover their ids.
    async fn batch_write(
        &self,
        table: &str,
        items: Vec<TableItem>,
    ) -> Result<Vec<String>, ServiceCallError> {
        let mut sent: Vec<(String, Item)> = Vec::with_capacity(items.len());
        let mut requests = Vec::with_capacity(items.len());
        for TableItem { id, item } in items {
            let item: Item = to_item(item)
                .map_err(|e| ServiceCallError::service("InvalidItem", e.to_string()))?;
            let put = PutRequest::builder()
                .set_item(Some(item.clone()))
                .build()
                .map_err(|e| ServiceCallError::service("InvalidItem", e.to_string()))?;
            requests.push(WriteRequest::builder().set_put_request(Some(put)).build());
            sent.push((id, item));
        }

        let output = self
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(sdk_error)?;

        let mut unprocessed = Vec::new();
        for requests in output.unprocessed_items.unwrap_or_default().into_values() {
            for request in requests {
                let Some(put) = request.put_request else {
                    continue;
                };
                if let Some((id, _)) = sent.iter().find(|(_, item)| *item == put.item) {
                    unprocessed.push(id.clone());
                }
            }
        }
        Ok(unprocessed)
    }
}
