//! TableAdapter - DynamoDB `BatchWriteItem` (put requests)

use std::collections::HashSet;
use std::future::Future;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use contracts::{encode_json, Batch, BatchLimits, FailureReason, Outcome, Record, ServiceAdapter, ServiceKind};

use super::{whole_batch_failure, ServiceCallError};

/// One item to put, tagged with its batch-local sequence id
#[derive(Debug, Clone, PartialEq)]
pub struct TableItem {
    pub id: String,
    pub item: Map<String, Value>,
}

/// Table batch write capability
pub trait TableApi: Send + Sync {
    /// Put items into a table, returning the ids of items left unprocessed
    fn batch_write(
        &self,
        table: &str,
        items: Vec<TableItem>,
    ) -> impl Future<Output = Result<Vec<String>, ServiceCallError>> + Send;
}

/// Writes records as items into one DynamoDB table
pub struct TableAdapter<C> {
    client: C,
    table: String,
    limits: BatchLimits,
}

impl<C: TableApi> TableAdapter<C> {
    pub fn new(client: C, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            limits: ServiceKind::Dynamodb.default_limits(),
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: TableApi> ServiceAdapter for TableAdapter<C> {
    fn name(&self) -> &str {
        ServiceKind::Dynamodb.as_str()
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        if !record.payload.is_object() {
            return Err(FailureReason::validation(
                "InvalidItem",
                "table items must be JSON objects",
            ));
        }
        encode_json(record)
    }

    #[instrument(
        name = "table_adapter_send",
        skip(self, batch),
        fields(table = %self.table, entries = batch.len())
    )]
    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut items = Vec::with_capacity(batch.len());
        for (seq, entry) in batch.iter_seq() {
            match serde_json::from_slice::<Map<String, Value>>(&entry.body) {
                Ok(item) => items.push(TableItem {
                    id: seq.to_string(),
                    item,
                }),
                Err(e) => outcomes.push(Outcome::rejected(entry.id, "InvalidItem", e.to_string())),
            }
        }
        if items.is_empty() {
            return outcomes;
        }

        let sent: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        match self.client.batch_write(&self.table, items).await {
            Ok(unprocessed) => {
                let unprocessed: HashSet<String> = unprocessed.into_iter().collect();
                if !unprocessed.is_empty() {
                    warn!(count = unprocessed.len(), "unprocessed items returned");
                }
                for id in sent {
                    let Some(entry) = batch.entry_by_wire_id(&id) else {
                        continue;
                    };
                    if unprocessed.contains(&id) {
                        outcomes.push(Outcome::transient(
                            entry.id,
                            "UnprocessedItem",
                            "item returned in UnprocessedItems",
                        ));
                    } else {
                        outcomes.push(Outcome::success(entry.id));
                    }
                }
            }
            Err(err) => {
                let sent_batch = Batch::new(
                    sent.iter()
                        .filter_map(|id| batch.entry_by_wire_id(id).cloned())
                        .collect(),
                );
                outcomes.extend(whole_batch_failure(self.name(), &sent_batch, &err, !err.is_fatal()));
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockTableClient;
    use contracts::{EncodedRecord, RecordId};
    use serde_json::json;

    fn batch_of(adapter: &TableAdapter<MockTableClient>, records: &[Record]) -> Batch {
        Batch::new(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| EncodedRecord::new(RecordId(i), adapter.encode(r).unwrap(), r))
                .collect(),
        )
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let adapter = TableAdapter::new(MockTableClient::accepting_all(), "users");
        let err = adapter.encode(&Record::new(json!([1, 2]))).unwrap_err();
        assert!(matches!(err, FailureReason::ValidationFailure { .. }));
    }

    #[tokio::test]
    async fn test_unprocessed_items_are_retryable() {
        let client = MockTableClient::new(|_, items| Ok(vec![items[1].id.clone()]));
        let adapter = TableAdapter::new(client.clone(), "users");
        let records: Vec<_> = (0..3).map(|i| Record::new(json!({ "pk": i }))).collect();

        let mut outcomes = adapter.send(&batch_of(&adapter, &records)).await;
        outcomes.sort_by_key(Outcome::record_id);
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].is_retryable());
        assert!(outcomes[2].is_success());

        let call = &client.calls()[0];
        assert_eq!(call.destination, "users");
        assert_eq!(call.request[2].item.get("pk"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_missing_table_rejects_batch() {
        let client = MockTableClient::failing(ServiceCallError::service(
            "ResourceNotFoundException",
            "no table",
        ));
        let adapter = TableAdapter::new(client, "users");
        let records = vec![Record::new(json!({ "pk": 1 }))];

        let outcomes = adapter.send(&batch_of(&adapter, &records)).await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_retryable() && !outcomes[0].is_success());
    }

    #[tokio::test]
    async fn test_throughput_exceeded_is_retryable() {
        let client = MockTableClient::failing(ServiceCallError::service(
            "ProvisionedThroughputExceededException",
            "slow down",
        ));
        let adapter = TableAdapter::new(client, "users");
        let records = vec![Record::new(json!({ "pk": 1 })), Record::new(json!({ "pk": 2 }))];

        let outcomes = adapter.send(&batch_of(&adapter, &records)).await;
        assert!(outcomes.iter().all(Outcome::is_retryable));
    }
}
