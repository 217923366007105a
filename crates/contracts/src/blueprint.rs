//! DispatchBlueprint - Config Loader output
//!
//! Describes a complete dispatch: target service, retry budget, concurrency
//! and how delivery keys are lifted out of dataset records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{BatchLimits, ServiceKind};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Where records go
    pub target: TargetConfig,

    /// Retry budget and backoff
    #[serde(default)]
    pub retry: RetryConfig,

    /// Engine settings
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// Delivery key extraction
    #[serde(default)]
    pub dataset: DatasetFields,
}

/// Target service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Service kind
    pub service: ServiceKind,

    /// Queue URL, topic ARN, stream name, table name or bucket name
    pub destination: String,

    /// AWS region (falls back to the default provider chain)
    #[serde(default)]
    pub region: Option<String>,

    /// Key prefix for S3 objects
    #[serde(default)]
    pub object_prefix: Option<String>,

    /// Overrides of the service's batch presets
    #[serde(default)]
    pub limits: LimitsOverride,
}

impl TargetConfig {
    /// Service preset with configured overrides applied
    pub fn effective_limits(&self) -> BatchLimits {
        let preset = self.service.default_limits();
        BatchLimits {
            max_items: self.limits.max_items.unwrap_or(preset.max_items),
            max_batch_bytes: self.limits.max_batch_bytes.unwrap_or(preset.max_batch_bytes),
            max_record_bytes: self
                .limits
                .max_record_bytes
                .unwrap_or(preset.max_record_bytes),
        }
    }
}

/// Optional batch limit overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsOverride {
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub max_batch_bytes: Option<usize>,
    #[serde(default)]
    pub max_record_bytes: Option<usize>,
}

/// Retry budget and exponential backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total dispatch attempts per record, including the first (>= 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for any single delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random spread applied to each delay, as a fraction in [0, 1]
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.2
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Maximum simultaneous batch calls within a round (>= 1)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

fn default_concurrency_limit() -> usize {
    8
}

/// Payload fields lifted into record delivery keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFields {
    #[serde(default)]
    pub dedupe_key_field: Option<String>,
    #[serde(default)]
    pub group_key_field: Option<String>,
    #[serde(default)]
    pub partition_key_field: Option<String>,
}
