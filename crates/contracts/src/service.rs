//! ServiceKind - supported target services and their batch presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BatchLimits;

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Target AWS service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// SQS queue (`SendMessageBatch`)
    Sqs,
    /// SNS topic (`PublishBatch`)
    Sns,
    /// Kinesis data stream (`PutRecords`)
    Kinesis,
    /// Kinesis Data Firehose delivery stream (`PutRecordBatch`)
    Firehose,
    /// DynamoDB table (`BatchWriteItem`)
    Dynamodb,
    /// S3 bucket, one JSON-lines object per batch (`PutObject`)
    S3,
}

impl ServiceKind {
    /// All supported services
    pub const ALL: [ServiceKind; 6] = [
        Self::Sqs,
        Self::Sns,
        Self::Kinesis,
        Self::Firehose,
        Self::Dynamodb,
        Self::S3,
    ];

    /// Batch limits from the service documentation.
    ///
    /// Configuration may override any of them.
    pub const fn default_limits(&self) -> BatchLimits {
        match self {
            Self::Sqs => BatchLimits::new(10, 256 * KIB, 256 * KIB),
            Self::Sns => BatchLimits::new(10, 256 * KIB, 256 * KIB),
            Self::Kinesis => BatchLimits::new(500, 5 * MIB, MIB),
            Self::Firehose => BatchLimits::new(500, 4 * MIB, 1000 * KIB),
            Self::Dynamodb => BatchLimits::new(25, 16 * MIB, 400 * KIB),
            Self::S3 => BatchLimits::new(10_000, 100 * MIB, 5 * MIB),
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqs => "sqs",
            Self::Sns => "sns",
            Self::Kinesis => "kinesis",
            Self::Firehose => "firehose",
            Self::Dynamodb => "dynamodb",
            Self::S3 => "s3",
        }
    }

    /// Bytes the adapter adds at least to a record's compact JSON before
    /// the limits are checked: the newline framing of Firehose and S3, and
    /// the shortest possible Kinesis partition key
    pub const fn min_record_overhead(&self) -> usize {
        match self {
            Self::Kinesis | Self::Firehose | Self::S3 => 1,
            Self::Sqs | Self::Sns | Self::Dynamodb => 0,
        }
    }

    /// Services whose per-record limit accepts a record whose compact JSON is
    /// `record_size` bytes
    pub fn accepting(record_size: usize) -> Vec<ServiceKind> {
        Self::ALL
            .into_iter()
            .filter(|s| record_size + s.min_record_overhead() <= s.default_limits().record_limit())
            .collect()
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown service '{s}'"))
    }
}
