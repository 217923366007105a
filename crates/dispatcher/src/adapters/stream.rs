//! StreamAdapter - Kinesis `PutRecords` and Firehose `PutRecordBatch`
//!
//! Both calls answer with one result per request entry, in request order.

use std::future::Future;

use bytes::Bytes;
use tracing::{instrument, warn};

use contracts::{
    encode_json, Batch, BatchLimits, EncodedRecord, FailureReason, Outcome, Record, RecordId,
    ServiceAdapter, ServiceKind,
};

use super::{whole_batch_failure, ServiceCallError};

/// Per-entry error codes worth retrying
const RETRYABLE_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "InternalFailure",
    "ServiceUnavailableException",
    "ThrottlingException",
    "KMSThrottlingException",
];

/// Kinesis partition keys are at most 256 Unicode characters
const MAX_PARTITION_KEY_CHARS: usize = 256;

/// One record in a stream batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub data: Bytes,
    pub partition_key: String,
}

/// Result for the entry at the same position in the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEntryResult {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl StreamEntryResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Stream batch put capability
pub trait StreamApi: Send + Sync {
    /// Put a batch of records; results are ordered like `entries`
    fn put_batch(
        &self,
        stream: &str,
        entries: Vec<StreamEntry>,
    ) -> impl Future<Output = Result<Vec<StreamEntryResult>, ServiceCallError>> + Send;
}

/// How records are delimited on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFraming {
    /// Body is the compact JSON document
    #[default]
    None,
    /// Body is followed by `\n` so consumers can split concatenated records
    Newline,
}

/// Puts records into one Kinesis data stream or Firehose delivery stream
pub struct StreamAdapter<C> {
    client: C,
    stream: String,
    service: ServiceKind,
    limits: BatchLimits,
    framing: RecordFraming,
}

impl<C: StreamApi> StreamAdapter<C> {
    /// Kinesis data stream (name or ARN)
    pub fn kinesis(client: C, stream: impl Into<String>) -> Self {
        Self {
            client,
            stream: stream.into(),
            service: ServiceKind::Kinesis,
            limits: ServiceKind::Kinesis.default_limits(),
            framing: RecordFraming::None,
        }
    }

    /// Firehose delivery stream, newline framed
    pub fn firehose(client: C, stream: impl Into<String>) -> Self {
        Self {
            client,
            stream: stream.into(),
            service: ServiceKind::Firehose,
            limits: ServiceKind::Firehose.default_limits(),
            framing: RecordFraming::Newline,
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_framing(mut self, framing: RecordFraming) -> Self {
        self.framing = framing;
        self
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn classify(&self, record_id: RecordId, result: StreamEntryResult) -> Outcome {
        match result.error_code {
            None => Outcome::success(record_id),
            Some(code) => {
                let message = result.error_message.unwrap_or_default();
                if RETRYABLE_CODES.contains(&code.as_str()) {
                    Outcome::transient(record_id, code, message)
                } else {
                    Outcome::rejected(record_id, code, message)
                }
            }
        }
    }
}

impl<C: StreamApi> ServiceAdapter for StreamAdapter<C> {
    fn name(&self) -> &str {
        self.service.as_str()
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        if self.service == ServiceKind::Kinesis {
            if let Some(key) = &record.partition_key {
                let chars = key.chars().count();
                if chars == 0 || chars > MAX_PARTITION_KEY_CHARS {
                    return Err(FailureReason::validation(
                        "InvalidPartitionKey",
                        format!("partition key must be 1..={MAX_PARTITION_KEY_CHARS} characters, got {chars}"),
                    ));
                }
            }
        }

        let body = encode_json(record)?;
        match self.framing {
            RecordFraming::None => Ok(body),
            RecordFraming::Newline => {
                let mut framed = Vec::with_capacity(body.len() + 1);
                framed.extend_from_slice(&body);
                framed.push(b'\n');
                Ok(Bytes::from(framed))
            }
        }
    }

    /// Kinesis counts the partition key against both size limits, so the key
    /// is fixed here and charged as overhead.
    fn encode_entry(&self, id: RecordId, record: &Record) -> Result<EncodedRecord, FailureReason> {
        let entry = EncodedRecord::new(id, self.encode(record)?, record);
        if self.service != ServiceKind::Kinesis {
            return Ok(entry);
        }
        let key = entry.partition_key.clone().unwrap_or_else(|| id.to_string());
        let overhead = key.len();
        Ok(EncodedRecord {
            partition_key: Some(key),
            ..entry
        }
        .with_overhead(overhead))
    }

    #[instrument(
        name = "stream_adapter_send",
        skip(self, batch),
        fields(service = %self.service, stream = %self.stream, entries = batch.len())
    )]
    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        let entries = batch
            .entries()
            .iter()
            .map(|e| StreamEntry {
                data: e.body.clone(),
                partition_key: e
                    .partition_key
                    .clone()
                    .unwrap_or_else(|| e.id.to_string()),
            })
            .collect();

        match self.client.put_batch(&self.stream, entries).await {
            Ok(results) => {
                if results.len() != batch.len() {
                    warn!(
                        expected = batch.len(),
                        received = results.len(),
                        "result count does not match request"
                    );
                }
                batch
                    .entries()
                    .iter()
                    .zip(results)
                    .map(|(entry, result)| self.classify(entry.id, result))
                    .collect()
            }
            Err(err) => whole_batch_failure(self.name(), batch, &err, !err.is_fatal()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockStreamClient;
    use crate::{DispatchEngine, EngineConfig, ExponentialBackoff};
    use contracts::FailureKind;
    use serde_json::json;
    use std::time::Duration;

    const MIB: usize = 1024 * 1024;

    fn batch_of<C: StreamApi>(adapter: &StreamAdapter<C>, records: &[Record]) -> Batch {
        Batch::new(
            records
                .iter()
                .enumerate()
                .map(|(i, r)| adapter.encode_entry(RecordId(i), r).unwrap())
                .collect(),
        )
    }

    /// Kinesis-like client: data plus key must fit 1 MiB per record and
    /// 5 MiB per call, otherwise the whole call is refused
    fn kinesis_size_checking_client() -> MockStreamClient {
        MockStreamClient::new(|_, entries| {
            let sizes: Vec<usize> = entries
                .iter()
                .map(|e| e.data.len() + e.partition_key.len())
                .collect();
            if sizes.iter().any(|&s| s > MIB) || sizes.iter().sum::<usize>() > 5 * MIB {
                return Err(ServiceCallError::service(
                    "InvalidArgumentException",
                    "request exceeds size limits",
                ));
            }
            Ok(vec![StreamEntryResult::ok(); entries.len()])
        })
    }

    /// JSON string record whose body plus the one-byte key "k" is `size` bytes
    fn keyed_record(size: usize) -> Record {
        Record::new(json!("x".repeat(size - 3))).with_partition_key("k")
    }

    #[tokio::test]
    async fn test_ordered_results_are_classified() {
        let client = MockStreamClient::new(|_, entries| {
            Ok(vec![
                StreamEntryResult::ok(),
                StreamEntryResult::error("ProvisionedThroughputExceededException", "slow down"),
                StreamEntryResult::error("AccessDeniedException", "denied"),
            ]
            .into_iter()
            .take(entries.len())
            .collect())
        });
        let adapter = StreamAdapter::kinesis(client, "events");
        let records: Vec<_> = (0..3).map(|i| Record::new(json!({ "i": i }))).collect();

        let outcomes = adapter.send(&batch_of(&adapter, &records)).await;
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].is_retryable());
        assert_eq!(
            outcomes[2],
            Outcome::rejected(RecordId(2), "AccessDeniedException", "denied")
        );
    }

    #[tokio::test]
    async fn test_partition_key_defaults_to_record_id() {
        let client = MockStreamClient::accepting_all();
        let adapter = StreamAdapter::kinesis(client.clone(), "events");
        let records = vec![
            Record::new(json!({})).with_partition_key("device-9"),
            Record::new(json!({})),
        ];

        adapter.send(&batch_of(&adapter, &records)).await;
        let request = &client.calls()[0].request;
        assert_eq!(request[0].partition_key, "device-9");
        assert_eq!(request[1].partition_key, "1");
    }

    #[test]
    fn test_kinesis_entry_charges_partition_key() {
        let adapter = StreamAdapter::kinesis(MockStreamClient::accepting_all(), "events");
        let keyed = adapter
            .encode_entry(RecordId(0), &Record::new(json!({})).with_partition_key("device-9"))
            .unwrap();
        assert_eq!(keyed.size(), 2 + 8);

        let defaulted = adapter.encode_entry(RecordId(42), &Record::new(json!({}))).unwrap();
        assert_eq!(defaulted.partition_key.as_deref(), Some("42"));
        assert_eq!(defaulted.size(), 2 + 2);
    }

    #[test]
    fn test_firehose_entry_has_no_overhead() {
        let adapter = StreamAdapter::firehose(MockStreamClient::accepting_all(), "delivery");
        let entry = adapter.encode_entry(RecordId(3), &Record::new(json!({}))).unwrap();
        assert_eq!(entry.overhead, 0);
        assert_eq!(entry.partition_key, None);
    }

    #[tokio::test]
    async fn test_kinesis_batches_fit_with_partition_keys() {
        let client = kinesis_size_checking_client();
        let adapter = StreamAdapter::kinesis(client.clone(), "events");
        let engine = DispatchEngine::new(adapter, ExponentialBackoff::new(3), EngineConfig::default()).unwrap();

        // five records at exactly 1 MiB with their key, one a byte over
        let mut records: Vec<_> = (0..5).map(|_| keyed_record(MIB)).collect();
        records.push(keyed_record(MIB + 1));

        let report = engine.dispatch(records).await;
        assert_eq!(report.succeeded.len(), 5);
        assert_eq!(report.failed_permanently.len(), 1);
        assert_eq!(
            report.failure_of(RecordId(5)).map(FailureReason::kind),
            Some(FailureKind::OversizeRecord)
        );

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        let wire: usize = calls[0]
            .request
            .iter()
            .map(|e| e.data.len() + e.partition_key.len())
            .sum();
        assert_eq!(wire, 5 * MIB);
    }

    #[tokio::test]
    async fn test_kinesis_default_keys_split_full_batches() {
        let client = kinesis_size_checking_client();
        let adapter = StreamAdapter::kinesis(client.clone(), "events");
        let engine = DispatchEngine::new(adapter, ExponentialBackoff::new(1), EngineConfig::default()).unwrap();

        // bodies of exactly 1 MiB leave no room for the id key
        let records: Vec<_> = (0..2).map(|_| Record::new(json!("x".repeat(MIB - 2)))).collect();
        let report = engine.dispatch(records).await;
        assert_eq!(report.failed_permanently.len(), 2);
        assert!(client.calls().is_empty());

        // bodies of 1 MiB minus the key still fill 5 MiB batches exactly
        let records: Vec<_> = (0..10).map(|_| Record::new(json!("x".repeat(MIB - 3)))).collect();
        let report = engine.dispatch(records).await;
        assert!(report.is_success(), "{:?}", report.failure_counts());
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_argument_is_not_retried() {
        let client = MockStreamClient::failing(ServiceCallError::service(
            "InvalidArgumentException",
            "record too large",
        ));
        let adapter = StreamAdapter::kinesis(client.clone(), "events");
        let policy = ExponentialBackoff::new(5).with_base_delay(Duration::from_millis(1));
        let engine = DispatchEngine::new(adapter, policy, EngineConfig::default()).unwrap();

        let report = engine.dispatch(vec![Record::new(json!(1))]).await;
        assert_eq!(client.calls().len(), 1);
        assert_eq!(
            report.failure_of(RecordId(0)).map(FailureReason::kind),
            Some(FailureKind::ValidationFailure)
        );
    }

    #[test]
    fn test_kinesis_rejects_long_partition_key() {
        let adapter = StreamAdapter::kinesis(MockStreamClient::accepting_all(), "events");
        let record = Record::new(json!({})).with_partition_key("k".repeat(257));
        assert!(adapter.encode(&record).is_err());
    }

    #[test]
    fn test_firehose_frames_with_newline() {
        let adapter = StreamAdapter::firehose(MockStreamClient::accepting_all(), "delivery");
        let body = adapter.encode(&Record::new(json!({"a": 1}))).unwrap();
        assert_eq!(&body[..], b"{\"a\":1}\n");
        assert_eq!(adapter.name(), "firehose");
        assert_eq!(adapter.limits(), ServiceKind::Firehose.default_limits());
    }

    #[tokio::test]
    async fn test_short_response_leaves_entries_unresolved() {
        let client = MockStreamClient::new(|_, _| Ok(vec![StreamEntryResult::ok()]));
        let adapter = StreamAdapter::kinesis(client, "events");
        let records = vec![Record::new(json!(1)), Record::new(json!(2))];

        let outcomes = adapter.send(&batch_of(&adapter, &records)).await;
        assert_eq!(outcomes, vec![Outcome::success(RecordId(0))]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retryable() {
        let client = MockStreamClient::failing(ServiceCallError::transport("connection reset"));
        let adapter = StreamAdapter::firehose(client, "delivery");
        let outcomes = adapter
            .send(&batch_of(&adapter, &[Record::new(json!(1))]))
            .await;
        assert!(outcomes[0].is_retryable());
    }
}
