//! Service clients over the AWS SDK
//!
//! Each SDK client implements the matching capability trait, and
//! [`AwsAdapter`] builds the right adapter for a configured target.

mod dynamodb;
mod firehose;
mod kinesis;
mod s3;
mod sns;
mod sqs;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bytes::Bytes;
use tracing::{info, instrument};

use contracts::{
    Batch, BatchLimits, EncodedRecord, FailureReason, Outcome, Record, RecordId, ServiceAdapter,
    ServiceKind, TargetConfig,
};

use super::{ObjectAdapter, QueueAdapter, ServiceCallError, StreamAdapter, TableAdapter, TopicAdapter};
use crate::error::DispatcherError;

/// Map an SDK failure onto a call-level error.
///
/// Service responses keep their error code; everything else (construction,
/// timeout, dispatch, unparseable response) is a transport error.
pub(crate) fn sdk_error<E, R>(err: SdkError<E, R>) -> ServiceCallError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let SdkError::ServiceError(_) = &err {
        return ServiceCallError::service(
            err.code().unwrap_or("Unknown"),
            err.message().unwrap_or_default(),
        );
    }
    ServiceCallError::transport(DisplayErrorContext(&err).to_string())
}

/// Load shared SDK configuration, optionally pinning the region
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest());
    match region {
        Some(region) => loader.region(Region::new(region.to_string())).load().await,
        None => loader.load().await,
    }
}

/// Adapter for any configured target, backed by the AWS SDK
pub enum AwsAdapter {
    Sqs(QueueAdapter<aws_sdk_sqs::Client>),
    Sns(TopicAdapter<aws_sdk_sns::Client>),
    Kinesis(StreamAdapter<aws_sdk_kinesis::Client>),
    Firehose(StreamAdapter<aws_sdk_firehose::Client>),
    Dynamodb(TableAdapter<aws_sdk_dynamodb::Client>),
    S3(ObjectAdapter<aws_sdk_s3::Client>),
}

impl AwsAdapter {
    /// Build the adapter for a target, applying its limit overrides
    #[instrument(
        name = "aws_adapter_from_target",
        skip(target),
        fields(service = %target.service, destination = %target.destination)
    )]
    pub async fn from_target(target: &TargetConfig) -> Result<Self, DispatcherError> {
        if target.destination.is_empty() {
            return Err(DispatcherError::adapter_creation(
                target.service.as_str(),
                "destination is empty",
            ));
        }
        let sdk = load_sdk_config(target.region.as_deref()).await;
        let limits = target.effective_limits();
        let destination = target.destination.clone();

        let adapter = match target.service {
            ServiceKind::Sqs => Self::Sqs(
                QueueAdapter::new(aws_sdk_sqs::Client::new(&sdk), destination).with_limits(limits),
            ),
            ServiceKind::Sns => Self::Sns(
                TopicAdapter::new(aws_sdk_sns::Client::new(&sdk), destination).with_limits(limits),
            ),
            ServiceKind::Kinesis => Self::Kinesis(
                StreamAdapter::kinesis(aws_sdk_kinesis::Client::new(&sdk), destination)
                    .with_limits(limits),
            ),
            ServiceKind::Firehose => Self::Firehose(
                StreamAdapter::firehose(aws_sdk_firehose::Client::new(&sdk), destination)
                    .with_limits(limits),
            ),
            ServiceKind::Dynamodb => Self::Dynamodb(
                TableAdapter::new(aws_sdk_dynamodb::Client::new(&sdk), destination)
                    .with_limits(limits),
            ),
            ServiceKind::S3 => Self::S3(
                ObjectAdapter::new(aws_sdk_s3::Client::new(&sdk), destination)
                    .with_prefix(target.object_prefix.clone().unwrap_or_default())
                    .with_limits(limits),
            ),
        };

        info!(
            region = ?sdk.region().map(|r| r.as_ref().to_string()),
            "aws adapter ready"
        );
        Ok(adapter)
    }
}

impl ServiceAdapter for AwsAdapter {
    fn name(&self) -> &str {
        match self {
            Self::Sqs(a) => a.name(),
            Self::Sns(a) => a.name(),
            Self::Kinesis(a) => a.name(),
            Self::Firehose(a) => a.name(),
            Self::Dynamodb(a) => a.name(),
            Self::S3(a) => a.name(),
        }
    }

    fn limits(&self) -> BatchLimits {
        match self {
            Self::Sqs(a) => a.limits(),
            Self::Sns(a) => a.limits(),
            Self::Kinesis(a) => a.limits(),
            Self::Firehose(a) => a.limits(),
            Self::Dynamodb(a) => a.limits(),
            Self::S3(a) => a.limits(),
        }
    }

    fn encode(&self, record: &Record) -> Result<Bytes, FailureReason> {
        match self {
            Self::Sqs(a) => a.encode(record),
            Self::Sns(a) => a.encode(record),
            Self::Kinesis(a) => a.encode(record),
            Self::Firehose(a) => a.encode(record),
            Self::Dynamodb(a) => a.encode(record),
            Self::S3(a) => a.encode(record),
        }
    }

    fn encode_entry(&self, id: RecordId, record: &Record) -> Result<EncodedRecord, FailureReason> {
        match self {
            Self::Sqs(a) => a.encode_entry(id, record),
            Self::Sns(a) => a.encode_entry(id, record),
            Self::Kinesis(a) => a.encode_entry(id, record),
            Self::Firehose(a) => a.encode_entry(id, record),
            Self::Dynamodb(a) => a.encode_entry(id, record),
            Self::S3(a) => a.encode_entry(id, record),
        }
    }

    async fn send(&self, batch: &Batch) -> Vec<Outcome> {
        match self {
            Self::Sqs(a) => a.send(batch).await,
            Self::Sns(a) => a.send(batch).await,
            Self::Kinesis(a) => a.send(batch).await,
            Self::Firehose(a) => a.send(batch).await,
            Self::Dynamodb(a) => a.send(batch).await,
            Self::S3(a) => a.send(batch).await,
        }
    }
}
