//! # Dispatcher
//!
//! Batched, failure-tolerant delivery of records to AWS services.
//!
//! Responsibilities:
//! - Partition records into batches that satisfy a service's limits
//! - Send batches concurrently through a `ServiceAdapter`
//! - Retry only the failed subset, with capped exponential backoff
//! - Settle every record exactly once in a `DispatchReport`
//!
//! ## Usage Example
//!
//! ```ignore
//! use dispatcher::adapters::QueueAdapter;
//! use dispatcher::{DispatchEngine, EngineConfig, ExponentialBackoff};
//!
//! let adapter = QueueAdapter::new(sqs_client, queue_url);
//! let engine = DispatchEngine::new(adapter, ExponentialBackoff::default(), EngineConfig::default())?;
//! let report = engine.dispatch(records).await;
//! println!("{} delivered, {} failed", report.succeeded.len(), report.failed_permanently.len());
//! ```

pub mod adapters;
pub mod batcher;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod retry;

pub use batcher::{partition, BatchError, Batcher};
pub use contracts::{DispatchReport, Record, ServiceAdapter};
pub use engine::{dispatch, BatchSummary, DispatchEngine, DispatchPlan, EngineConfig};
pub use error::DispatcherError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use retry::{ExponentialBackoff, RetryPolicy};
