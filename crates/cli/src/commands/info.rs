//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceKind;
use dataset::JsonDataset;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Dataset info for JSON output
#[derive(Serialize)]
struct DatasetInfo {
    path: String,
    records: usize,
    total_bytes: usize,
    max_record_bytes: usize,
    services: Vec<ServiceInfo>,
}

#[derive(Serialize)]
struct ServiceInfo {
    service: String,
    max_items: usize,
    max_record_bytes: usize,
    accepts_all: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(input = %args.input.display(), "Loading dataset info");

    if !args.input.exists() {
        return Err(CliError::input_not_found(&args.input).into());
    }

    let dataset = JsonDataset::load(&args.input)
        .with_context(|| format!("Failed to load dataset from {}", args.input.display()))?;
    let info = build_dataset_info(&dataset, args);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize dataset info")?;
        println!("{}", json);
    } else {
        print_dataset_info(&info);
    }

    Ok(())
}

fn build_dataset_info(dataset: &JsonDataset, args: &InfoArgs) -> DatasetInfo {
    let accepting = dataset.available_services();
    let services = ServiceKind::ALL
        .iter()
        .map(|&service| {
            let limits = service.default_limits();
            ServiceInfo {
                service: service.to_string(),
                max_items: limits.max_items,
                max_record_bytes: limits.record_limit(),
                accepts_all: accepting.contains(&service),
            }
        })
        .collect();

    DatasetInfo {
        path: args.input.display().to_string(),
        records: dataset.len(),
        total_bytes: dataset.record_sizes(true).iter().sum(),
        max_record_bytes: dataset.max_record_size(),
        services,
    }
}

fn print_dataset_info(info: &DatasetInfo) {
    println!("Dataset: {}", info.path);
    println!("   ├─ Records: {}", info.records);
    println!("   ├─ Total size: {} bytes", info.total_bytes);
    println!("   └─ Largest record: {} bytes", info.max_record_bytes);

    println!("\nServices");
    for (i, service) in info.services.iter().enumerate() {
        let prefix = if i == info.services.len() - 1 { "└─" } else { "├─" };
        let mark = if service.accepts_all { "✓" } else { "✗" };
        println!(
            "   {} {} {} (≤ {} items/batch, ≤ {} bytes/record)",
            prefix, mark, service.service, service.max_items, service.max_record_bytes
        );
    }

    println!();
}
