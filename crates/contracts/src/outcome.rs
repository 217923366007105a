//! Outcome - per-record result of a batch call

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RecordId;

/// Why a record did not (or not yet) reach the service
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The encoded record exceeds the adapter's per-record limit
    #[error("record is {size} bytes, limit is {limit} bytes")]
    OversizeRecord { size: usize, limit: usize },

    /// The service (or the adapter) refused the record's content or the caller's permissions
    #[error("validation failure [{code}]: {message}")]
    ValidationFailure { code: String, message: String },

    /// Throttling, timeout, capacity or internal service error
    #[error("transient service failure [{code}]: {message}")]
    TransientServiceFailure { code: String, message: String },

    /// Retryable failures persisted past the retry budget
    #[error("retry budget exhausted after {attempts} attempts, last error: {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },

    /// The caller aborted the dispatch before the record settled
    #[error("dispatch cancelled")]
    Cancelled,
}

impl FailureReason {
    /// Create a validation failure
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a transient failure
    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientServiceFailure {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Reason discriminant
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::OversizeRecord { .. } => FailureKind::OversizeRecord,
            Self::ValidationFailure { .. } => FailureKind::ValidationFailure,
            Self::TransientServiceFailure { .. } => FailureKind::TransientServiceFailure,
            Self::RetryBudgetExhausted { .. } => FailureKind::RetryBudgetExhausted,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Reason discriminant, usable as a map key or metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OversizeRecord,
    ValidationFailure,
    TransientServiceFailure,
    RetryBudgetExhausted,
    Cancelled,
}

impl FailureKind {
    /// Snake-case label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OversizeRecord => "oversize_record",
            Self::ValidationFailure => "validation_failure",
            Self::TransientServiceFailure => "transient_service_failure",
            Self::RetryBudgetExhausted => "retry_budget_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of delivering one record in one adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        record_id: RecordId,
    },
    Failure {
        record_id: RecordId,
        reason: FailureReason,
        retryable: bool,
    },
}

impl Outcome {
    /// Record delivered
    pub fn success(record_id: RecordId) -> Self {
        Self::Success { record_id }
    }

    /// Retryable failure (throttling, timeout, capacity, internal error)
    pub fn transient(
        record_id: RecordId,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failure {
            record_id,
            reason: FailureReason::transient(code, message),
            retryable: true,
        }
    }

    /// Non-retryable failure (malformed payload, permission denied, too large)
    pub fn rejected(
        record_id: RecordId,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failure {
            record_id,
            reason: FailureReason::validation(code, message),
            retryable: false,
        }
    }

    /// Record this outcome belongs to
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Success { record_id } | Self::Failure { record_id, .. } => *record_id,
        }
    }

    /// Whether the record was delivered
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the record may be re-dispatched
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failure { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let ok = Outcome::success(RecordId(1));
        assert!(ok.is_success());
        assert!(!ok.is_retryable());

        let transient = Outcome::transient(RecordId(2), "Throttling", "slow down");
        assert!(transient.is_retryable());
        assert_eq!(transient.record_id(), RecordId(2));

        let rejected = Outcome::rejected(RecordId(3), "AccessDenied", "no");
        assert!(!rejected.is_retryable());
        assert!(!rejected.is_success());
    }

    #[test]
    fn test_failure_reason_serializes_tagged() {
        let reason = FailureReason::OversizeRecord {
            size: 300,
            limit: 256,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "oversize_record");
        assert_eq!(json["size"], 300);
        assert_eq!(reason.kind().as_str(), "oversize_record");
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::RetryBudgetExhausted {
            attempts: 3,
            last_error: "ThrottlingException".into(),
        };
        assert!(reason.to_string().contains("after 3 attempts"));
        assert_eq!(FailureReason::Cancelled.to_string(), "dispatch cancelled");
    }
}
