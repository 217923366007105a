//! Configuration validation
//!
//! Rules:
//! - destination non-empty and shaped for the service (queue URL, topic ARN)
//! - object_prefix only for s3
//! - limit overrides >= 1
//! - max_attempts >= 1, base_delay_ms <= max_delay_ms, 0 <= jitter <= 1
//! - concurrency_limit >= 1

use contracts::{ContractError, DispatchBlueprint, LimitsOverride, ServiceKind};

/// Validate a DispatchBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    validate_target(blueprint)?;
    validate_limits(&blueprint.target.limits)?;
    validate_retry(blueprint)?;
    validate_dispatch(blueprint)?;
    Ok(())
}

/// Non-fatal findings: settings that are legal but probably not intended
pub fn warnings(blueprint: &DispatchBlueprint) -> Vec<String> {
    let target = &blueprint.target;
    let preset = target.service.default_limits();
    let effective = target.effective_limits();
    let mut warnings = Vec::new();

    for (field, value, limit) in [
        ("max_items", effective.max_items, preset.max_items),
        ("max_batch_bytes", effective.max_batch_bytes, preset.max_batch_bytes),
        ("max_record_bytes", effective.max_record_bytes, preset.max_record_bytes),
    ] {
        if value > limit {
            warnings.push(format!(
                "target.limits.{field} ({value}) exceeds the {} limit ({limit}); the service will reject such batches",
                target.service
            ));
        }
    }

    let messaging = matches!(target.service, ServiceKind::Sqs | ServiceKind::Sns);
    if messaging && target.destination.ends_with(".fifo") && blueprint.dataset.group_key_field.is_none() {
        warnings.push(
            "FIFO destination without dataset.group_key_field; records without a group key will be rejected"
                .to_string(),
        );
    }
    if !messaging
        && (blueprint.dataset.dedupe_key_field.is_some() || blueprint.dataset.group_key_field.is_some())
    {
        warnings.push(format!(
            "dedupe/group key fields are ignored by {}",
            target.service
        ));
    }
    if blueprint.dataset.partition_key_field.is_some() && target.service != ServiceKind::Kinesis {
        warnings.push(format!(
            "partition_key_field is ignored by {}",
            target.service
        ));
    }
    if blueprint.retry.max_attempts == 1 {
        warnings.push("retry.max_attempts = 1 disables retries".to_string());
    }

    warnings
}

/// Validate the target section
fn validate_target(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let target = &blueprint.target;
    let destination = target.destination.trim();

    if destination.is_empty() {
        return Err(ContractError::config_validation(
            "target.destination",
            "destination cannot be empty",
        ));
    }

    match target.service {
        ServiceKind::Sqs
            if !(destination.starts_with("https://") || destination.starts_with("http://")) =>
        {
            return Err(ContractError::config_validation(
                "target.destination",
                format!("sqs destination must be a queue URL, got '{destination}'"),
            ));
        }
        ServiceKind::Sns if !destination.starts_with("arn:") => {
            return Err(ContractError::config_validation(
                "target.destination",
                format!("sns destination must be a topic ARN, got '{destination}'"),
            ));
        }
        _ => {}
    }

    if target.object_prefix.is_some() && target.service != ServiceKind::S3 {
        return Err(ContractError::config_validation(
            "target.object_prefix",
            format!("object_prefix only applies to s3, not {}", target.service),
        ));
    }

    if let Some(region) = &target.region {
        if region.trim().is_empty() {
            return Err(ContractError::config_validation(
                "target.region",
                "region cannot be empty when set",
            ));
        }
    }

    Ok(())
}

/// Validate limit overrides
fn validate_limits(limits: &LimitsOverride) -> Result<(), ContractError> {
    for (field, value) in [
        ("max_items", limits.max_items),
        ("max_batch_bytes", limits.max_batch_bytes),
        ("max_record_bytes", limits.max_record_bytes),
    ] {
        if value == Some(0) {
            return Err(ContractError::config_validation(
                format!("target.limits.{field}"),
                format!("{field} must be >= 1"),
            ));
        }
    }
    Ok(())
}

/// Validate retry settings
fn validate_retry(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let retry = &blueprint.retry;

    if retry.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "retry.max_attempts",
            "max_attempts must be >= 1",
        ));
    }

    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(ContractError::config_validation(
            "retry.base_delay_ms / retry.max_delay_ms",
            format!(
                "base_delay_ms ({}) must be <= max_delay_ms ({})",
                retry.base_delay_ms, retry.max_delay_ms
            ),
        ));
    }

    if !(0.0..=1.0).contains(&retry.jitter) {
        return Err(ContractError::config_validation(
            "retry.jitter",
            format!("jitter must be within [0, 1], got {}", retry.jitter),
        ));
    }

    Ok(())
}

/// Validate engine settings
fn validate_dispatch(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    if blueprint.dispatch.concurrency_limit == 0 {
        return Err(ContractError::config_validation(
            "dispatch.concurrency_limit",
            "concurrency_limit must be >= 1",
        ));
    }
    Ok(())
}
