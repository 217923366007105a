//! Engine metrics for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one engine, accumulated across dispatch calls
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Adapter calls issued
    batches_sent: AtomicU64,
    /// Records accepted by the service
    records_succeeded: AtomicU64,
    /// Retryable failures that were re-queued
    records_retried: AtomicU64,
    /// Records settled as permanent failures
    records_failed: AtomicU64,
    /// Dispatch rounds run
    rounds: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    pub fn inc_batches_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_succeeded(&self) -> u64 {
        self.records_succeeded.load(Ordering::Relaxed)
    }

    pub fn add_records_succeeded(&self, n: u64) {
        self.records_succeeded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn records_retried(&self) -> u64 {
        self.records_retried.load(Ordering::Relaxed)
    }

    pub fn add_records_retried(&self, n: u64) {
        self.records_retried.fetch_add(n, Ordering::Relaxed);
    }

    pub fn records_failed(&self) -> u64 {
        self.records_failed.load(Ordering::Relaxed)
    }

    pub fn add_records_failed(&self, n: u64) {
        self.records_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    pub fn inc_rounds(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_sent: self.batches_sent(),
            records_succeeded: self.records_succeeded(),
            records_retried: self.records_retried(),
            records_failed: self.records_failed(),
            rounds: self.rounds(),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub batches_sent: u64,
    pub records_succeeded: u64,
    pub records_retried: u64,
    pub records_failed: u64,
    pub rounds: u64,
}
