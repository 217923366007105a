//! Shared request/response shapes of the SQS and SNS batch calls
//!
//! Both calls take up to ten entries with caller-chosen ids and answer with
//! two unordered lists: ids that succeeded and per-entry errors.

use tracing::warn;

use contracts::{Batch, FailureReason, Outcome, Record};

/// One message in a batch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    /// Batch-local sequence id
    pub id: String,
    pub body: String,
    pub dedupe_id: Option<String>,
    pub group_id: Option<String>,
}

/// A failed entry in a batch response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntryError {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    /// The request itself was at fault; retrying cannot help
    pub sender_fault: bool,
}

impl BatchEntryError {
    pub fn new(id: impl Into<String>, code: impl Into<String>, sender_fault: bool) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            message: None,
            sender_fault,
        }
    }
}

/// Response of a batch call that reports results by entry id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdBatchResponse {
    pub successful: Vec<String>,
    pub failed: Vec<BatchEntryError>,
}

impl IdBatchResponse {
    /// Every entry succeeded
    pub fn all_successful(entries: &[MessageEntry]) -> Self {
        Self {
            successful: entries.iter().map(|e| e.id.clone()).collect(),
            failed: Vec::new(),
        }
    }
}

/// Request entries for a batch, keyed by sequence id
pub(crate) fn message_entries(batch: &Batch) -> Vec<MessageEntry> {
    batch
        .iter_seq()
        .map(|(seq, entry)| MessageEntry {
            id: seq.to_string(),
            body: entry.body_str().into_owned(),
            dedupe_id: entry.dedupe_key.clone(),
            group_id: entry.group_key.clone(),
        })
        .collect()
}

/// Map an id-keyed response back onto the batch
pub(crate) fn correlate(adapter: &str, batch: &Batch, response: IdBatchResponse) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(batch.len());

    for id in &response.successful {
        match batch.entry_by_wire_id(id) {
            Some(entry) => outcomes.push(Outcome::success(entry.id)),
            None => warn!(adapter, entry_id = %id, "response names an unknown entry"),
        }
    }

    for failure in response.failed {
        let Some(entry) = batch.entry_by_wire_id(&failure.id) else {
            warn!(adapter, entry_id = %failure.id, "response names an unknown entry");
            continue;
        };
        let message = failure.message.unwrap_or_default();
        if failure.sender_fault {
            outcomes.push(Outcome::rejected(entry.id, failure.code, message));
        } else {
            outcomes.push(Outcome::transient(entry.id, failure.code, message));
        }
    }

    outcomes
}

/// FIFO destinations reject messages without a group id
pub(crate) fn check_group_key(fifo: bool, record: &Record) -> Result<(), FailureReason> {
    if fifo && record.group_key.is_none() {
        return Err(FailureReason::validation(
            "MissingGroupKey",
            "FIFO destinations require a group key",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{EncodedRecord, RecordId};
    use serde_json::json;

    fn batch(ids: &[usize]) -> Batch {
        Batch::new(
            ids.iter()
                .map(|&i| {
                    let record = Record::new(json!({ "i": i })).with_dedupe_key(format!("d{i}"));
                    EncodedRecord::new(RecordId(i), Bytes::from(format!("{{\"i\":{i}}}")), &record)
                })
                .collect(),
        )
    }

    #[test]
    fn test_entries_use_sequence_ids() {
        let entries = message_entries(&batch(&[40, 41]));
        assert_eq!(entries[0].id, "0");
        assert_eq!(entries[1].id, "1");
        assert_eq!(entries[1].body, r#"{"i":41}"#);
        assert_eq!(entries[1].dedupe_id.as_deref(), Some("d41"));
    }

    #[test]
    fn test_correlate_unordered_results() {
        let batch = batch(&[10, 11, 12]);
        let response = IdBatchResponse {
            successful: vec!["2".into(), "0".into()],
            failed: vec![BatchEntryError::new("1", "InternalError", false)],
        };

        let mut outcomes = correlate("sqs", &batch, response);
        outcomes.sort_by_key(Outcome::record_id);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].record_id(), RecordId(11));
        assert!(outcomes[1].is_retryable());
        assert!(outcomes[2].is_success());
    }

    #[test]
    fn test_sender_fault_is_not_retryable() {
        let batch = batch(&[0]);
        let response = IdBatchResponse {
            successful: vec![],
            failed: vec![BatchEntryError {
                message: Some("bad body".into()),
                ..BatchEntryError::new("0", "InvalidMessageContents", true)
            }],
        };
        let outcomes = correlate("sqs", &batch, response);
        assert_eq!(
            outcomes,
            vec![Outcome::rejected(RecordId(0), "InvalidMessageContents", "bad body")]
        );
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let response = IdBatchResponse {
            successful: vec!["7".into(), "x".into()],
            failed: vec![],
        };
        assert!(correlate("sqs", &batch(&[0]), response).is_empty());
    }

    #[test]
    fn test_group_key_required_for_fifo() {
        let record = Record::new(json!({}));
        assert!(check_group_key(false, &record).is_ok());
        assert!(check_group_key(true, &record).is_err());
        assert!(check_group_key(true, &record.with_group_key("g")).is_ok());
    }
}
