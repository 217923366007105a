//! # Integration Tests
//!
//! Cross-crate flows: dataset file and configuration through the engine to
//! scripted service clients.
//!
//! Covers:
//! - contract snapshots
//! - end-to-end dispatch per service (no AWS needed)
//! - conservation under retries and cancellation

#[cfg(test)]
mod contract_tests {
    use contracts::{FailureReason, ServiceKind};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_failure_reason_wire_shape() {
        let reason = FailureReason::transient("Throttling", "slow down");
        let json = serde_json::to_value(&reason).unwrap();
        let back: FailureReason = serde_json::from_value(json).unwrap();
        assert_eq!(back, reason);
        assert_eq!(back.kind(), contracts::FailureKind::TransientServiceFailure);
    }

    #[test]
    fn test_service_names_round_trip() {
        for service in ServiceKind::ALL {
            assert_eq!(service.as_str().parse::<ServiceKind>().unwrap(), service);
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        DispatchBlueprint, DispatchReport, FailureKind, FailureReason, Record, RecordId,
    };
    use dataset::JsonDataset;
    use dispatcher::adapters::mock::{
        MockMessageClient, MockObjectClient, MockStreamClient, MockTableClient,
    };
    use dispatcher::adapters::{
        BatchEntryError, IdBatchResponse, ObjectAdapter, QueueAdapter, ServiceCallError,
        StreamAdapter, StreamEntryResult, TableAdapter,
    };
    use dispatcher::{DispatchEngine, EngineConfig, ExponentialBackoff, ServiceAdapter};
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    const QUEUE: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/jobs";

    fn config(toml: &str) -> DispatchBlueprint {
        ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap()
    }

    /// Write `records` to a dataset file and load them back as dispatch records
    fn dataset_records(records: Vec<Value>, blueprint: &DispatchBlueprint) -> Vec<Record> {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(&records).unwrap().as_bytes())
            .unwrap();
        JsonDataset::load(file.path())
            .unwrap()
            .into_records(&blueprint.dataset)
    }

    fn numbered(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": i, "body": "hello" })).collect()
    }

    fn engine<A>(adapter: A, blueprint: &DispatchBlueprint) -> DispatchEngine<A>
    where
        A: ServiceAdapter + Sync + 'static,
    {
        DispatchEngine::new(
            adapter,
            ExponentialBackoff::from_config(&blueprint.retry),
            EngineConfig::from_settings(&blueprint.dispatch),
        )
        .unwrap()
    }

    /// Every input record settles exactly once, both lists ordered by id
    fn assert_conserved(report: &DispatchReport, n: usize) {
        assert_eq!(report.total(), n);
        let mut seen = HashSet::new();
        for id in report.succeeded_ids().into_iter().chain(report.failed_ids()) {
            assert!(seen.insert(id), "record {id} settled twice");
        }
        assert_eq!(seen.len(), n);
        assert!(report.succeeded_ids().windows(2).all(|w| w[0] < w[1]));
        assert!(report.failed_ids().windows(2).all(|w| w[0] < w[1]));
    }

    /// 25 records, max_items=10, all succeed -> batches [10, 10, 5], one attempt
    #[tokio::test]
    async fn test_sqs_all_succeed() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"
"#
        ));
        let records = dataset_records(numbered(25), &bp);
        let client = MockMessageClient::accepting_all();
        let adapter = QueueAdapter::new(client.clone(), &bp.target.destination)
            .with_limits(bp.target.effective_limits());

        let report = engine(adapter, &bp).dispatch(records).await;

        assert_conserved(&report, 25);
        assert_eq!(report.succeeded.len(), 25);
        assert_eq!(report.attempts_made, 1);
        assert!(report.is_success());

        let mut sizes: Vec<_> = client.calls().iter().map(|c| c.request.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![5, 10, 10]);
        assert!(client.calls().iter().all(|c| c.destination == QUEUE));
    }

    /// 10 records, 3 transient failures on the first send, second attempt clean
    #[tokio::test(start_paused = true)]
    async fn test_sqs_partial_retry() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"
"#
        ));
        let records = dataset_records(numbered(10), &bp);
        let client = MockMessageClient::new(|call, entries| {
            if call == 0 {
                Ok(IdBatchResponse {
                    successful: entries[3..].iter().map(|e| e.id.clone()).collect(),
                    failed: entries[..3]
                        .iter()
                        .map(|e| BatchEntryError::new(&e.id, "ServiceUnavailable", false))
                        .collect(),
                })
            } else {
                Ok(IdBatchResponse::all_successful(entries))
            }
        });
        let adapter = QueueAdapter::new(client.clone(), QUEUE);

        let report = engine(adapter, &bp).dispatch(records).await;

        assert_conserved(&report, 10);
        assert_eq!(report.succeeded.len(), 10);
        assert_eq!(report.attempts_made, 2);

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        let retried: Vec<Value> = calls[1]
            .request
            .iter()
            .map(|e| serde_json::from_str::<Value>(&e.body).unwrap()["id"].clone())
            .collect();
        assert_eq!(retried, vec![json!(0), json!(1), json!(2)]);
    }

    /// One oversize record fails before any call; the rest are delivered
    #[tokio::test]
    async fn test_oversize_record_rejected_before_send() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"
"#
        ));
        let mut data = numbered(4);
        data[2] = json!({ "id": 2, "body": "x".repeat(300 * 1024) });
        let records = dataset_records(data, &bp);
        let client = MockMessageClient::accepting_all();

        let report = engine(QueueAdapter::new(client.clone(), QUEUE), &bp)
            .dispatch(records)
            .await;

        assert_conserved(&report, 4);
        assert_eq!(report.failed_ids(), vec![RecordId(2)]);
        assert_eq!(
            report.failure_of(RecordId(2)).map(FailureReason::kind),
            Some(FailureKind::OversizeRecord)
        );
        let sent: usize = client.calls().iter().map(|c| c.request.len()).sum();
        assert_eq!(sent, 3);
    }

    /// FIFO queue: group and dedupe keys lifted from the dataset, missing
    /// group keys rejected without a call
    #[tokio::test]
    async fn test_fifo_queue_keys() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}.fifo"

[dataset]
dedupe_key_field = "id"
group_key_field = "tenant"
"#
        ));
        let records = dataset_records(
            vec![
                json!({ "id": "a", "tenant": "t1" }),
                json!({ "id": "b" }),
                json!({ "id": 7, "tenant": "t2" }),
            ],
            &bp,
        );
        let client = MockMessageClient::accepting_all();

        let report = engine(QueueAdapter::new(client.clone(), &bp.target.destination), &bp)
            .dispatch(records)
            .await;

        assert_conserved(&report, 3);
        assert_eq!(report.succeeded_ids(), vec![RecordId(0), RecordId(2)]);
        assert!(matches!(
            report.failure_of(RecordId(1)),
            Some(FailureReason::ValidationFailure { code, .. }) if code == "MissingGroupKey"
        ));

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        let entries = &calls[0].request;
        assert_eq!(entries[0].group_id.as_deref(), Some("t1"));
        assert_eq!(entries[0].dedupe_id.as_deref(), Some("a"));
        assert_eq!(entries[1].group_id.as_deref(), Some("t2"));
        assert_eq!(entries[1].dedupe_id.as_deref(), Some("7"));
    }

    /// Kinesis: one record keeps failing and exhausts the retry budget
    #[tokio::test(start_paused = true)]
    async fn test_kinesis_retry_budget_exhausted() {
        let bp = config(
            r#"
[target]
service = "kinesis"
destination = "telemetry"

[retry]
max_attempts = 3

[dataset]
partition_key_field = "device"
"#,
        );
        let records = dataset_records(
            vec![
                json!({ "device": "d1", "v": 1 }),
                json!({ "device": "hot", "v": 2 }),
                json!({ "device": "d2", "v": 3 }),
            ],
            &bp,
        );
        let client = MockStreamClient::new(|_, entries| {
            Ok(entries
                .iter()
                .map(|e| {
                    if e.partition_key == "hot" {
                        StreamEntryResult::error("ProvisionedThroughputExceededException", "hot shard")
                    } else {
                        StreamEntryResult::ok()
                    }
                })
                .collect())
        });

        let report = engine(StreamAdapter::kinesis(client.clone(), "telemetry"), &bp)
            .dispatch(records)
            .await;

        assert_conserved(&report, 3);
        assert_eq!(report.attempts_made, 3);
        assert_eq!(report.succeeded_ids(), vec![RecordId(0), RecordId(2)]);
        match report.failure_of(RecordId(1)) {
            Some(FailureReason::RetryBudgetExhausted { attempts, last_error }) => {
                assert_eq!(*attempts, 3);
                assert!(last_error.contains("ProvisionedThroughputExceededException"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].request.len(), 3);
        assert!(calls[1..].iter().all(|c| c.request.len() == 1));
    }

    /// DynamoDB: unprocessed items go back to pending and succeed later
    #[tokio::test(start_paused = true)]
    async fn test_dynamodb_unprocessed_items_retried() {
        let bp = config(
            r#"
[target]
service = "dynamodb"
destination = "events"
"#,
        );
        let records = dataset_records(numbered(30), &bp);
        let client = MockTableClient::new(|call, items| {
            if call == 0 {
                Ok(items.iter().take(2).map(|i| i.id.clone()).collect())
            } else {
                Ok(Vec::new())
            }
        });

        let report = engine(TableAdapter::new(client.clone(), "events"), &bp)
            .dispatch(records)
            .await;

        assert_conserved(&report, 30);
        assert!(report.is_success());
        assert_eq!(report.attempts_made, 2);

        let calls = client.calls();
        let first_round: usize = calls[..2].iter().map(|c| c.request.len()).sum();
        assert_eq!(first_round, 30);
        assert!(calls[..2].iter().all(|c| c.request.len() <= 25));
        let retried: usize = calls[2..].iter().map(|c| c.request.len()).sum();
        assert_eq!(retried, 2);
    }

    /// DynamoDB rejects non-object records at encode time
    #[tokio::test]
    async fn test_dynamodb_rejects_scalar_records() {
        let bp = config(
            r#"
[target]
service = "dynamodb"
destination = "events"
"#,
        );
        let records = vec![
            Record::new(json!({ "pk": "a" })),
            Record::new(json!("just a string")),
        ];
        let client = MockTableClient::accepting_all();

        let report = engine(TableAdapter::new(client, "events"), &bp)
            .dispatch(records)
            .await;

        assert_conserved(&report, 2);
        assert_eq!(report.failed_ids(), vec![RecordId(1)]);
    }

    /// S3: each batch becomes one JSON-lines object under the prefix
    #[tokio::test]
    async fn test_s3_objects_per_batch() {
        let bp = config(
            r#"
[target]
service = "s3"
destination = "exports"
object_prefix = "daily/"

[target.limits]
max_items = 4
"#,
        );
        let records = dataset_records(numbered(10), &bp);
        let client = MockObjectClient::accepting_all();
        let adapter = ObjectAdapter::new(client.clone(), "exports")
            .with_prefix(bp.target.object_prefix.clone().unwrap_or_default())
            .with_run_id("run")
            .with_limits(bp.target.effective_limits());

        let report = engine(adapter, &bp).dispatch(records).await;

        assert_conserved(&report, 10);
        assert!(report.is_success());

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        let mut keys = HashSet::new();
        let mut lines = 0;
        for call in &calls {
            assert_eq!(call.destination, "exports");
            assert!(call.request.key.starts_with("daily/"));
            assert!(call.request.key.ends_with(".jsonl"));
            assert!(keys.insert(call.request.key.clone()));
            let body = std::str::from_utf8(&call.request.body).unwrap();
            for line in body.lines() {
                serde_json::from_str::<Value>(line).unwrap();
                lines += 1;
            }
        }
        assert_eq!(lines, 10);
    }

    /// A fatal call-level error fails the whole batch without retrying
    #[tokio::test]
    async fn test_fatal_call_error_not_retried() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"
"#
        ));
        let client = MockMessageClient::failing(ServiceCallError::service(
            "AWS.SimpleQueueService.NonExistentQueue",
            "no such queue",
        ));

        let report = engine(QueueAdapter::new(client.clone(), QUEUE), &bp)
            .dispatch(dataset_records(numbered(5), &bp))
            .await;

        assert_conserved(&report, 5);
        assert_eq!(report.attempts_made, 1);
        assert_eq!(client.call_count(), 1);
        assert_eq!(
            report.failure_counts().get(&FailureKind::ValidationFailure),
            Some(&5)
        );
    }

    /// Flaky transport on every other call: nothing is delivered twice
    #[tokio::test(start_paused = true)]
    async fn test_conservation_under_flaky_transport() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"

[retry]
max_attempts = 10

[dispatch]
concurrency_limit = 3
"#
        ));
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let client = MockMessageClient::new(move |call, entries| {
            if call % 2 == 1 {
                return Err(ServiceCallError::transport("connection reset"));
            }
            counter.fetch_add(entries.len(), Ordering::SeqCst);
            Ok(IdBatchResponse::all_successful(entries))
        });

        let report = engine(QueueAdapter::new(client, QUEUE), &bp)
            .dispatch(dataset_records(numbered(57), &bp))
            .await;

        assert_conserved(&report, 57);
        assert!(report.is_success());
        assert!(report.attempts_made > 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 57);
    }

    /// Cancellation during backoff settles the rest as cancelled
    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_conservation() {
        let bp = config(&format!(
            r#"
[target]
service = "sqs"
destination = "{QUEUE}"

[retry]
max_attempts = 5
base_delay_ms = 60000
max_delay_ms = 60000
jitter = 0.0
"#
        ));
        let client = MockMessageClient::new(|_, entries| {
            Ok(IdBatchResponse {
                successful: entries[..1].iter().map(|e| e.id.clone()).collect(),
                failed: entries[1..]
                    .iter()
                    .map(|e| BatchEntryError::new(&e.id, "InternalError", false))
                    .collect(),
            })
        });
        let cancel = CancellationToken::new();
        let engine = engine(QueueAdapter::new(client, QUEUE), &bp).with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });
        let report = engine.dispatch(dataset_records(numbered(4), &bp)).await;
        trigger.await.unwrap();

        assert_conserved(&report, 4);
        assert!(report.cancelled);
        assert_eq!(report.succeeded_ids(), vec![RecordId(0)]);
        assert_eq!(
            report.failure_counts().get(&FailureKind::Cancelled),
            Some(&3)
        );
    }

    /// A service listed as accepting a dataset delivers its largest record,
    /// including records right at the per-record limit
    #[tokio::test]
    async fn test_available_services_agree_with_dispatch() {
        for (service, destination) in [("firehose", "delivery"), ("kinesis", "events")] {
            let bp = config(&format!(
                r#"
[target]
service = "{service}"
destination = "{destination}"
"#
            ));
            let limit = bp.target.effective_limits().record_limit();

            for size in [limit - 1, limit] {
                let dataset = JsonDataset::from_records(vec![json!({ "b": "x".repeat(size - 8) })]).unwrap();
                assert_eq!(dataset.max_record_size(), size);
                let listed = dataset
                    .available_services()
                    .contains(&bp.target.service);

                let adapter = if service == "kinesis" {
                    StreamAdapter::kinesis(MockStreamClient::accepting_all(), destination)
                } else {
                    StreamAdapter::firehose(MockStreamClient::accepting_all(), destination)
                };
                let report = engine(adapter, &bp)
                    .dispatch(dataset.into_records(&bp.dataset))
                    .await;

                assert_eq!(listed, report.is_success(), "{service} at {size} bytes");
                assert_eq!(listed, size < limit, "{service} at {size} bytes");
            }
        }
    }

    /// Report summaries line up with the report
    #[tokio::test]
    async fn test_report_summary() {
        let bp = config(
            r#"
[target]
service = "firehose"
destination = "delivery"
"#,
        );
        let report = engine(
            StreamAdapter::firehose(MockStreamClient::accepting_all(), "delivery"),
            &bp,
        )
        .dispatch(dataset_records(numbered(12), &bp))
        .await;

        observability::record_dispatch_report("firehose", &report);
        let summary = observability::ReportSummary::from(&report);
        assert_eq!(summary.total, 12);
        assert_eq!(summary.succeeded, 12);
        assert!(summary.to_string().contains("Records: 12"));
    }
}
