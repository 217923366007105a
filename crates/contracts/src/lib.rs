//! # Contracts
//!
//! Frozen interface contracts shared by every awsjson crate: records, batches,
//! per-record outcomes, the dispatch report, the `ServiceAdapter` capability
//! trait and the dispatch configuration blueprint.
//!
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - A record's `RecordId` is its index in the input dataset
//! - The id is stable across retries, so a record can settle at most once

mod adapter;
mod batch;
mod blueprint;
mod error;
mod outcome;
mod record;
mod report;
mod service;

pub use adapter::{encode_json, LocalServiceAdapter, ServiceAdapter};
pub use batch::{Batch, BatchLimits};
pub use blueprint::*;
pub use error::*;
pub use outcome::{FailureKind, FailureReason, Outcome};
pub use record::{EncodedRecord, Record, RecordId};
pub use report::{DeliveredRecord, DispatchReport, FailedRecord};
pub use service::ServiceKind;
