//! DispatchEngine - batches records, sends them, retries the failed subset
//!
//! One dispatch runs in rounds. Each round partitions the pending records,
//! sends every batch concurrently (bounded by `concurrency_limit`) and waits
//! for all of them before the next round starts. Retryable failures go back to
//! pending; everything else settles in the report exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use contracts::{
    Batch, BatchLimits, DeliveredRecord, DispatchReport, DispatchSettings, EncodedRecord,
    FailedRecord, FailureReason, Outcome, Record, RecordId, ServiceAdapter,
};

use crate::batcher::Batcher;
use crate::error::DispatcherError;
use crate::metrics::DispatchMetrics;
use crate::retry::{ExponentialBackoff, RetryPolicy};

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum simultaneous batch calls within a round
    pub concurrency_limit: usize,
}

impl EngineConfig {
    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self {
            concurrency_limit: settings.concurrency_limit,
        }
    }

    fn validate(&self) -> Result<(), DispatcherError> {
        if self.concurrency_limit == 0 {
            return Err(DispatcherError::invalid_config(
                "concurrency_limit",
                "concurrency_limit must be >= 1",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&DispatchSettings::default())
    }
}

/// Size of one planned batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub records: usize,
    pub bytes: usize,
}

/// What a dispatch would send on its first round, computed without network calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchPlan {
    pub batches: Vec<BatchSummary>,
    /// Records refused before batching
    pub rejected: Vec<(RecordId, FailureReason)>,
}

impl DispatchPlan {
    /// Records that would be sent
    pub fn sendable(&self) -> usize {
        self.batches.iter().map(|b| b.records).sum()
    }
}

/// Orchestrates batching, sending and retrying for one adapter
pub struct DispatchEngine<A, P = ExponentialBackoff> {
    adapter: Arc<A>,
    policy: P,
    config: EngineConfig,
    batcher: Batcher,
    metrics: Arc<DispatchMetrics>,
    cancel: CancellationToken,
}

impl<A, P> DispatchEngine<A, P>
where
    A: ServiceAdapter + Sync + 'static,
    P: RetryPolicy,
{
    /// Build an engine, rejecting configurations that cannot dispatch
    pub fn new(adapter: A, policy: P, config: EngineConfig) -> Result<Self, DispatcherError> {
        config.validate()?;
        let batcher =
            Batcher::new(adapter.limits()).map_err(|source| DispatcherError::InvalidLimits {
                adapter: adapter.name().to_string(),
                source,
            })?;

        Ok(Self {
            adapter: Arc::new(adapter),
            policy,
            config,
            batcher,
            metrics: Arc::new(DispatchMetrics::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Engine-wide shutdown token.
    ///
    /// Cancelling it aborts every in-flight dispatch, and every later
    /// `dispatch` on this engine settles all of its records as `Cancelled`
    /// without sending. To stop a single call, pass a child of this token to
    /// [`dispatch_with_cancellation`](Self::dispatch_with_cancellation).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn limits(&self) -> BatchLimits {
        self.batcher.limits()
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// First-round batch plan for `records`
    pub fn plan(&self, records: &[Record]) -> DispatchPlan {
        let (sendable, rejected) = self.prepare(records);
        let batches = self
            .batcher
            .pack(sendable)
            .iter()
            .map(|b| BatchSummary {
                records: b.len(),
                bytes: b.total_bytes(),
            })
            .collect();
        DispatchPlan { batches, rejected }
    }

    /// Deliver `records`, retrying retryable failures until they succeed, the
    /// retry budget runs out or the dispatch is cancelled.
    ///
    /// Every input record ends in exactly one of `succeeded` and
    /// `failed_permanently`.
    pub async fn dispatch(&self, records: Vec<Record>) -> DispatchReport {
        self.dispatch_with_cancellation(records, self.cancel.child_token())
            .await
    }

    /// `dispatch` aborted by `cancel` instead of the engine-wide token.
    ///
    /// Pass `engine.cancellation_token().child_token()` to keep engine
    /// shutdown effective while cancelling only this call.
    #[instrument(
        name = "engine_dispatch",
        skip(self, records, cancel),
        fields(service = %self.adapter.name(), records = records.len())
    )]
    pub async fn dispatch_with_cancellation(
        &self,
        records: Vec<Record>,
        cancel: CancellationToken,
    ) -> DispatchReport {
        let started = Instant::now();
        let (mut pending, rejected) = self.prepare(&records);
        let mut ledger = Ledger::new(records);

        if !rejected.is_empty() {
            debug!(rejected = rejected.len(), "records rejected before batching");
            self.metrics.add_records_failed(rejected.len() as u64);
        }
        for (id, reason) in rejected {
            ledger.fail(id, reason);
        }

        let mut attempt: u32 = 0;
        let mut cancelled = false;

        while !pending.is_empty() {
            if attempt > 0 {
                if !self.policy.should_retry(attempt) {
                    break;
                }
                let delay = self.policy.delay(attempt - 1);
                debug!(
                    attempt,
                    pending = pending.len(),
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let round = self
                .run_round(attempt, std::mem::take(&mut pending), &cancel)
                .await;
            attempt += 1;
            self.metrics.inc_rounds();

            let (mut succeeded, mut retried, mut failed) = (0u64, 0u64, 0u64);
            for (entry, outcome) in round.resolved {
                match outcome {
                    Outcome::Success { .. } => {
                        if ledger.succeed(entry.id) {
                            succeeded += 1;
                        }
                    }
                    Outcome::Failure {
                        reason,
                        retryable: true,
                        ..
                    } => {
                        ledger.note_error(entry.id, reason.to_string());
                        pending.push(entry);
                        retried += 1;
                    }
                    Outcome::Failure { reason, .. } => {
                        if ledger.fail(entry.id, reason) {
                            failed += 1;
                        }
                    }
                }
            }
            self.metrics.add_records_succeeded(succeeded);
            self.metrics.add_records_retried(retried);
            self.metrics.add_records_failed(failed);

            let interrupted = !round.unresolved.is_empty();
            pending.extend(round.unresolved);
            pending.sort_by_key(|e| e.id);

            debug!(
                attempt = attempt - 1,
                succeeded,
                failed,
                retryable = retried,
                "round finished"
            );

            if interrupted {
                cancelled = true;
                break;
            }
        }

        let unsettled = pending.len() as u64;
        for entry in pending {
            let reason = if cancelled {
                FailureReason::Cancelled
            } else {
                FailureReason::RetryBudgetExhausted {
                    attempts: attempt,
                    last_error: ledger.last_error(entry.id),
                }
            };
            ledger.fail(entry.id, reason);
        }
        self.metrics.add_records_failed(unsettled);

        let report = ledger.finish(attempt, cancelled, started.elapsed());
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed_permanently.len(),
            attempts = report.attempts_made,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "dispatch finished"
        );
        report
    }

    /// Encode every record and split off the ones that cannot be sent
    fn prepare(&self, records: &[Record]) -> (Vec<EncodedRecord>, Vec<(RecordId, FailureReason)>) {
        let mut encoded = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let id = RecordId(index);
            match self.adapter.encode_entry(id, record) {
                Ok(entry) => encoded.push(entry),
                Err(reason) => rejected.push((id, reason)),
            }
        }

        let (sendable, oversize) = self.batcher.split_oversize(encoded);
        rejected.extend(oversize.into_iter().map(|(entry, reason)| (entry.id, reason)));
        rejected.sort_by_key(|(id, _)| *id);
        (sendable, rejected)
    }

    #[instrument(
        name = "engine_round",
        skip(self, pending, cancel),
        fields(records = pending.len())
    )]
    async fn run_round(
        &self,
        attempt: u32,
        pending: Vec<EncodedRecord>,
        cancel: &CancellationToken,
    ) -> RoundResult {
        let batches: Vec<Arc<Batch>> = self
            .batcher
            .pack(pending)
            .into_iter()
            .map(Arc::new)
            .collect();
        debug!(batches = batches.len(), "dispatching round");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut tasks = JoinSet::new();
        for (index, batch) in batches.iter().enumerate() {
            let adapter = Arc::clone(&self.adapter);
            let batch = Arc::clone(batch);
            let semaphore = Arc::clone(&semaphore);
            let metrics = Arc::clone(&self.metrics);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => BatchResult::Cancelled,
                    outcomes = send_batch(adapter.as_ref(), &batch, &semaphore, &metrics) => {
                        BatchResult::Completed(outcomes)
                    }
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<BatchResult>> = (0..batches.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "batch task failed"),
            }
        }

        let mut round = RoundResult::default();
        for (batch, result) in batches.into_iter().zip(results) {
            match result {
                Some(BatchResult::Completed(outcomes)) => {
                    let aligned = reconcile(&batch, outcomes);
                    round.resolved.extend(into_entries(batch).into_iter().zip(aligned));
                }
                Some(BatchResult::Cancelled) => round.unresolved.extend(into_entries(batch)),
                None => {
                    let aligned = synthesize(
                        &batch,
                        "AdapterTaskFailed",
                        "adapter call terminated without a result",
                    );
                    round.resolved.extend(into_entries(batch).into_iter().zip(aligned));
                }
            }
        }
        round
    }
}

/// Dispatch with the default engine configuration
pub async fn dispatch<A, P>(
    records: Vec<Record>,
    adapter: A,
    policy: P,
) -> Result<DispatchReport, DispatcherError>
where
    A: ServiceAdapter + Sync + 'static,
    P: RetryPolicy,
{
    let engine = DispatchEngine::new(adapter, policy, EngineConfig::default())?;
    Ok(engine.dispatch(records).await)
}

enum BatchResult {
    Completed(Vec<Outcome>),
    Cancelled,
}

#[derive(Default)]
struct RoundResult {
    /// Entries with an outcome, in batch order
    resolved: Vec<(EncodedRecord, Outcome)>,
    /// Entries whose batch was cancelled in flight
    unresolved: Vec<EncodedRecord>,
}

async fn send_batch<A: ServiceAdapter>(
    adapter: &A,
    batch: &Batch,
    semaphore: &Semaphore,
    metrics: &DispatchMetrics,
) -> Vec<Outcome> {
    let Ok(_permit) = semaphore.acquire().await else {
        return synthesize(batch, "ConcurrencyLimiterClosed", "send slot unavailable");
    };
    metrics.inc_batches_sent();
    adapter.send(batch).await
}

/// Align adapter outcomes with batch entries, one outcome per entry
fn reconcile(batch: &Batch, outcomes: Vec<Outcome>) -> Vec<Outcome> {
    let positions: HashMap<RecordId, usize> =
        batch.iter_seq().map(|(seq, entry)| (entry.id, seq)).collect();
    let mut aligned: Vec<Option<Outcome>> = vec![None; batch.len()];

    for outcome in outcomes {
        let id = outcome.record_id();
        match positions.get(&id) {
            None => warn!(record_id = %id, "ignoring outcome for a record outside the batch"),
            Some(&seq) if aligned[seq].is_some() => {
                warn!(record_id = %id, "ignoring duplicate outcome")
            }
            Some(&seq) => aligned[seq] = Some(outcome),
        }
    }

    aligned
        .into_iter()
        .zip(batch.entries())
        .map(|(outcome, entry)| {
            outcome.unwrap_or_else(|| {
                warn!(record_id = %entry.id, "adapter returned no outcome");
                Outcome::transient(
                    entry.id,
                    "MissingOutcome",
                    "adapter returned no outcome for this record",
                )
            })
        })
        .collect()
}

fn synthesize(batch: &Batch, code: &str, message: &str) -> Vec<Outcome> {
    batch
        .record_ids()
        .into_iter()
        .map(|id| Outcome::transient(id, code, message))
        .collect()
}

fn into_entries(batch: Arc<Batch>) -> Vec<EncodedRecord> {
    Arc::try_unwrap(batch)
        .map(Batch::into_entries)
        .unwrap_or_else(|shared| shared.entries().to_vec())
}

/// Per-dispatch settlement state, owned by the orchestrating task.
///
/// A record leaves its slot exactly once, which is what keeps it from
/// appearing twice in the report.
struct Ledger {
    slots: Vec<Option<Record>>,
    last_errors: Vec<Option<String>>,
    report: DispatchReport,
}

impl Ledger {
    fn new(records: Vec<Record>) -> Self {
        let len = records.len();
        Self {
            slots: records.into_iter().map(Some).collect(),
            last_errors: vec![None; len],
            report: DispatchReport::default(),
        }
    }

    fn succeed(&mut self, id: RecordId) -> bool {
        match self.take(id) {
            Some(record) => {
                self.report.succeeded.push(DeliveredRecord { id, record });
                true
            }
            None => false,
        }
    }

    fn fail(&mut self, id: RecordId, reason: FailureReason) -> bool {
        match self.take(id) {
            Some(record) => {
                self.report
                    .failed_permanently
                    .push(FailedRecord { id, record, reason });
                true
            }
            None => false,
        }
    }

    fn note_error(&mut self, id: RecordId, error: String) {
        if let Some(slot) = self.last_errors.get_mut(id.index()) {
            *slot = Some(error);
        }
    }

    fn last_error(&self, id: RecordId) -> String {
        self.last_errors
            .get(id.index())
            .and_then(Clone::clone)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn take(&mut self, id: RecordId) -> Option<Record> {
        let record = self.slots.get_mut(id.index()).and_then(Option::take);
        if record.is_none() {
            warn!(record_id = %id, "record already settled");
        }
        record
    }

    fn finish(
        mut self,
        attempts: u32,
        cancelled: bool,
        elapsed: std::time::Duration,
    ) -> DispatchReport {
        self.report.succeeded.sort_by_key(|d| d.id);
        self.report.failed_permanently.sort_by_key(|f| f.id);
        self.report.attempts_made = attempts;
        self.report.cancelled = cancelled;
        self.report.elapsed = elapsed;
        self.report
    }
}
