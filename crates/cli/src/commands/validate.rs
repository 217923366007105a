//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::DispatchBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    service: String,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    max_items: usize,
    max_batch_bytes: usize,
    max_record_bytes: usize,
    max_attempts: u32,
    concurrency_limit: usize,
}

impl From<&DispatchBlueprint> for ConfigSummary {
    fn from(blueprint: &DispatchBlueprint) -> Self {
        let limits = blueprint.target.effective_limits();
        Self {
            version: format!("{:?}", blueprint.version),
            service: blueprint.target.service.to_string(),
            destination: blueprint.target.destination.clone(),
            region: blueprint.target.region.clone(),
            max_items: limits.max_items,
            max_batch_bytes: limits.max_batch_bytes,
            max_record_bytes: limits.max_record_bytes,
            max_attempts: blueprint.retry.max_attempts,
            concurrency_limit: blueprint.dispatch.concurrency_limit,
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: config_loader::ConfigLoader::warnings(&blueprint),
            summary: Some(ConfigSummary::from(&blueprint)),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Service: {}", summary.service);
            println!("  Destination: {}", summary.destination);
            if let Some(ref region) = summary.region {
                println!("  Region: {}", region);
            }
            println!(
                "  Limits: {} items, {} bytes/batch, {} bytes/record",
                summary.max_items, summary.max_batch_bytes, summary.max_record_bytes
            );
            println!("  Max attempts: {}", summary.max_attempts);
            println!("  Concurrency: {}", summary.concurrency_limit);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
