//! Dispatch metrics
//!
//! Publishes the outcome of a dispatch through the `metrics` facade and
//! renders a human-readable summary of a `DispatchReport`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use contracts::{DispatchReport, FailureKind};
use metrics::{counter, gauge, histogram};

/// Record the outcome of one dispatch call
///
/// # Example
///
/// ```ignore
/// let report = engine.dispatch(records).await;
/// observability::metrics::record_dispatch_report("sqs", &report);
/// ```
pub fn record_dispatch_report(service: &str, report: &DispatchReport) {
    counter!(
        "awsjson_records_dispatched_total",
        "service" => service.to_string(),
        "status" => "succeeded"
    )
    .increment(report.succeeded.len() as u64);

    counter!(
        "awsjson_records_dispatched_total",
        "service" => service.to_string(),
        "status" => "failed"
    )
    .increment(report.failed_permanently.len() as u64);

    for (kind, count) in report.failure_counts() {
        counter!(
            "awsjson_records_failed_total",
            "service" => service.to_string(),
            "reason" => kind.as_str()
        )
        .increment(count as u64);
    }

    histogram!("awsjson_dispatch_attempts", "service" => service.to_string())
        .record(f64::from(report.attempts_made));
    histogram!("awsjson_dispatch_duration_ms", "service" => service.to_string())
        .record(report.elapsed.as_secs_f64() * 1000.0);

    if report.cancelled {
        counter!("awsjson_dispatch_cancelled_total", "service" => service.to_string())
            .increment(1);
    }
}

/// Record the size of the dataset about to be dispatched
pub fn record_dataset_size(records: usize) {
    gauge!("awsjson_dataset_records").set(records as f64);
}

/// Report summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub attempts: u32,
    pub cancelled: bool,
    pub elapsed: Duration,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
}

impl From<&DispatchReport> for ReportSummary {
    fn from(report: &DispatchReport) -> Self {
        let total = report.total();
        let succeeded = report.succeeded.len();
        Self {
            total,
            succeeded,
            failed: report.failed_permanently.len(),
            success_rate: if total > 0 {
                succeeded as f64 / total as f64 * 100.0
            } else {
                100.0
            },
            attempts: report.attempts_made,
            cancelled: report.cancelled,
            elapsed: report.elapsed,
            failures_by_kind: report.failure_counts(),
        }
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Records: {}", self.total)?;
        writeln!(
            f,
            "Succeeded: {} ({:.2}%)",
            self.succeeded, self.success_rate
        )?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Attempts: {}", self.attempts)?;
        writeln!(f, "Elapsed: {:.3}s", self.elapsed.as_secs_f64())?;
        if self.cancelled {
            writeln!(f, "Cancelled: yes")?;
        }

        if !self.failures_by_kind.is_empty() {
            writeln!(f, "Failures by reason:")?;
            for (kind, count) in &self.failures_by_kind {
                writeln!(f, "  {}: {}", kind.as_str(), count)?;
            }
        }

        Ok(())
    }
}
