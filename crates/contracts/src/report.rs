//! DispatchReport - terminal accounting of one dispatch call

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{FailureKind, FailureReason, Record, RecordId};

/// A record the service accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredRecord {
    pub id: RecordId,
    pub record: Record,
}

/// A record that will not be delivered by this dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub id: RecordId,
    pub record: Record,
    pub reason: FailureReason,
}

/// Complete result of a dispatch call.
///
/// Every input record appears in exactly one of `succeeded` and
/// `failed_permanently`; both are ordered by `RecordId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Records accepted by the service
    pub succeeded: Vec<DeliveredRecord>,

    /// Records given up on, with the reason
    pub failed_permanently: Vec<FailedRecord>,

    /// Number of dispatch rounds performed
    pub attempts_made: u32,

    /// Whether the dispatch was cancelled before it finished
    #[serde(default)]
    pub cancelled: bool,

    /// Wall-clock duration of the dispatch
    #[serde(default)]
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Total settled records
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed_permanently.len()
    }

    /// Whether every record was delivered
    pub fn is_success(&self) -> bool {
        self.failed_permanently.is_empty() && !self.cancelled
    }

    /// Permanently failed records grouped by reason kind
    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for failed in &self.failed_permanently {
            *counts.entry(failed.reason.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Ids of delivered records
    pub fn succeeded_ids(&self) -> Vec<RecordId> {
        self.succeeded.iter().map(|d| d.id).collect()
    }

    /// Ids of permanently failed records
    pub fn failed_ids(&self) -> Vec<RecordId> {
        self.failed_permanently.iter().map(|f| f.id).collect()
    }

    /// Failure for a given record, if it failed
    pub fn failure_of(&self, id: RecordId) -> Option<&FailureReason> {
        self.failed_permanently
            .iter()
            .find(|f| f.id == id)
            .map(|f| &f.reason)
    }
}
