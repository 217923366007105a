//! `dispatch` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::{DispatchBlueprint, DispatchReport, Record, ServiceAdapter, ServiceKind};
use dataset::JsonDataset;
use dispatcher::adapters::mock::{
    MockMessageClient, MockObjectClient, MockStreamClient, MockTableClient,
};
use dispatcher::adapters::{ObjectAdapter, QueueAdapter, StreamAdapter, TableAdapter, TopicAdapter};
use dispatcher::{DispatchEngine, DispatchPlan, EngineConfig, ExponentialBackoff};
use observability::ReportSummary;
use tracing::{info, warn};

use crate::cli::DispatchArgs;
use crate::error::CliError;

/// Execute the `dispatch` command
pub async fn run_dispatch(args: &DispatchArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        warn!("{warning}");
    }

    if !args.input.exists() {
        return Err(CliError::input_not_found(&args.input).into());
    }
    let dataset = JsonDataset::load(&args.input)
        .with_context(|| format!("Failed to load dataset from {}", args.input.display()))?;
    observability::record_dataset_size(dataset.len());
    let records = dataset.into_records(&blueprint.dataset);

    info!(
        service = %blueprint.target.service,
        destination = %blueprint.target.destination,
        records = records.len(),
        max_attempts = blueprint.retry.max_attempts,
        concurrency_limit = blueprint.dispatch.concurrency_limit,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - nothing will be sent");
        let plan = plan_offline(&blueprint, &records)?;
        print_plan(&blueprint, &plan);
        return Ok(());
    }

    if let Some(port) = args.metrics_port {
        observability::init_metrics_only(port)?;
    }

    let report = send(&blueprint, records).await?;
    let service = blueprint.target.service.as_str();
    observability::record_dispatch_report(service, &report);
    println!("{}", ReportSummary::from(&report));

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!(path = %path.display(), "Report written");
    }

    check_report(&report)
}

/// Load the configuration and apply command-line overrides
fn load_blueprint(args: &DispatchArgs) -> Result<DispatchBlueprint> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if apply_overrides(&mut blueprint, args) {
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Command-line overrides produce an invalid configuration")?;
    }

    Ok(blueprint)
}

/// Apply overrides; returns whether anything changed
fn apply_overrides(blueprint: &mut DispatchBlueprint, args: &DispatchArgs) -> bool {
    let mut changed = false;
    if let Some(destination) = &args.destination {
        info!(destination = %destination, "Overriding destination from CLI");
        blueprint.target.destination = destination.clone();
        changed = true;
    }
    if let Some(max_attempts) = args.max_attempts {
        info!(max_attempts, "Overriding max_attempts from CLI");
        blueprint.retry.max_attempts = max_attempts;
        changed = true;
    }
    if let Some(concurrency) = args.concurrency {
        info!(concurrency, "Overriding concurrency_limit from CLI");
        blueprint.dispatch.concurrency_limit = concurrency;
        changed = true;
    }
    changed
}

/// Compute the first-round batch plan without touching the network.
///
/// Planning only encodes and packs, so the adapters are built over clients
/// that are never called.
fn plan_offline(blueprint: &DispatchBlueprint, records: &[Record]) -> Result<DispatchPlan> {
    let target = &blueprint.target;
    let limits = target.effective_limits();
    let destination = target.destination.clone();

    match target.service {
        ServiceKind::Sqs => plan_with(
            QueueAdapter::new(MockMessageClient::accepting_all(), destination).with_limits(limits),
            blueprint,
            records,
        ),
        ServiceKind::Sns => plan_with(
            TopicAdapter::new(MockMessageClient::accepting_all(), destination).with_limits(limits),
            blueprint,
            records,
        ),
        ServiceKind::Kinesis => plan_with(
            StreamAdapter::kinesis(MockStreamClient::accepting_all(), destination)
                .with_limits(limits),
            blueprint,
            records,
        ),
        ServiceKind::Firehose => plan_with(
            StreamAdapter::firehose(MockStreamClient::accepting_all(), destination)
                .with_limits(limits),
            blueprint,
            records,
        ),
        ServiceKind::Dynamodb => plan_with(
            TableAdapter::new(MockTableClient::accepting_all(), destination).with_limits(limits),
            blueprint,
            records,
        ),
        ServiceKind::S3 => plan_with(
            ObjectAdapter::new(MockObjectClient::accepting_all(), destination)
                .with_prefix(target.object_prefix.clone().unwrap_or_default())
                .with_limits(limits),
            blueprint,
            records,
        ),
    }
}

fn plan_with<A>(adapter: A, blueprint: &DispatchBlueprint, records: &[Record]) -> Result<DispatchPlan>
where
    A: ServiceAdapter + Sync + 'static,
{
    let engine = DispatchEngine::new(
        adapter,
        ExponentialBackoff::from_config(&blueprint.retry),
        EngineConfig::from_settings(&blueprint.dispatch),
    )
    .context("Failed to build dispatch engine")?;
    Ok(engine.plan(records))
}

/// Dispatch through the AWS SDK, cancelling on Ctrl+C or SIGTERM
#[cfg(feature = "aws")]
async fn send(blueprint: &DispatchBlueprint, records: Vec<Record>) -> Result<DispatchReport> {
    use dispatcher::adapters::aws::AwsAdapter;

    let adapter = AwsAdapter::from_target(&blueprint.target)
        .await
        .context("Failed to create AWS adapter")?;
    let engine = DispatchEngine::new(
        adapter,
        ExponentialBackoff::from_config(&blueprint.retry),
        EngineConfig::from_settings(&blueprint.dispatch),
    )
    .context("Failed to build dispatch engine")?;

    let cancel = engine.cancellation_token();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, cancelling dispatch...");
        cancel.cancel();
    });

    info!("Starting dispatch...");
    let report = engine.dispatch(records).await;
    signal_task.abort();

    let snapshot = engine.metrics().snapshot();
    info!(
        batches_sent = snapshot.batches_sent,
        records_retried = snapshot.records_retried,
        rounds = snapshot.rounds,
        "Dispatch finished"
    );
    Ok(report)
}

#[cfg(not(feature = "aws"))]
async fn send(_blueprint: &DispatchBlueprint, _records: Vec<Record>) -> Result<DispatchReport> {
    Err(CliError::AwsSupportDisabled.into())
}

/// Wait for Ctrl+C or SIGTERM
#[cfg(feature = "aws")]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn write_report(path: &Path, report: &DispatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Map the report onto the command result
fn check_report(report: &DispatchReport) -> Result<()> {
    let failed = report.failed_permanently.len();
    let total = report.total();
    if report.cancelled {
        return Err(CliError::Cancelled {
            attempts: report.attempts_made,
            failed,
            total,
        }
        .into());
    }
    if failed > 0 {
        return Err(CliError::DeliveryIncomplete { failed, total }.into());
    }
    Ok(())
}

/// Print the dry-run plan
fn print_plan(blueprint: &DispatchBlueprint, plan: &DispatchPlan) {
    let limits = blueprint.target.effective_limits();

    println!("\n=== Dispatch Plan ===\n");
    println!("Target:");
    println!("  Service: {}", blueprint.target.service);
    println!("  Destination: {}", blueprint.target.destination);
    println!(
        "  Limits: {} items, {} bytes/batch, {} bytes/record",
        limits.max_items, limits.max_batch_bytes, limits.max_record_bytes
    );

    println!("\nFirst round:");
    println!("  Batches: {}", plan.batches.len());
    println!("  Records to send: {}", plan.sendable());
    for (i, batch) in plan.batches.iter().enumerate() {
        println!("    #{i}: {} records, {} bytes", batch.records, batch.bytes);
    }

    if !plan.rejected.is_empty() {
        println!("\nRejected before sending ({}):", plan.rejected.len());
        for (id, reason) in &plan.rejected {
            println!("  - record {id}: {reason}");
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> DispatchArgs {
        DispatchArgs {
            config: PathBuf::from("awsjson.toml"),
            input: PathBuf::from("records.json"),
            destination: None,
            max_attempts: None,
            concurrency: None,
            dry_run: true,
            report: None,
            metrics_port: None,
        }
    }

    fn blueprint(service: &str, destination: &str) -> DispatchBlueprint {
        config_loader::ConfigLoader::load_from_str(
            &format!(
                r#"
[target]
service = "{service}"
destination = "{destination}"

[target.limits]
max_items = 10
"#
            ),
            config_loader::ConfigFormat::Toml,
        )
        .unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(serde_json::json!({ "n": i })))
            .collect()
    }

    #[test]
    fn test_overrides_applied() {
        let mut bp = blueprint("sqs", "https://sqs.us-east-1.amazonaws.com/1/a");
        assert!(!apply_overrides(&mut bp, &args()));

        let mut with = args();
        with.destination = Some("https://sqs.us-east-1.amazonaws.com/1/b".into());
        with.max_attempts = Some(2);
        with.concurrency = Some(3);
        assert!(apply_overrides(&mut bp, &with));
        assert!(bp.target.destination.ends_with("/b"));
        assert_eq!(bp.retry.max_attempts, 2);
        assert_eq!(bp.dispatch.concurrency_limit, 3);
    }

    #[test]
    fn test_plan_offline_batches() {
        let bp = blueprint("sqs", "https://sqs.us-east-1.amazonaws.com/1/a");
        let plan = plan_offline(&bp, &records(25)).unwrap();
        let sizes: Vec<_> = plan.batches.iter().map(|b| b.records).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn test_plan_offline_every_service() {
        for (service, destination) in [
            ("sns", "arn:aws:sns:us-east-1:1:t"),
            ("kinesis", "stream"),
            ("firehose", "delivery"),
            ("dynamodb", "table"),
            ("s3", "bucket"),
        ] {
            let bp = blueprint(service, destination);
            let plan = plan_offline(&bp, &records(3)).unwrap();
            assert_eq!(plan.sendable(), 3, "{service}");
        }
    }

    #[test]
    fn test_check_report() {
        assert!(check_report(&DispatchReport::default()).is_ok());

        let cancelled = DispatchReport {
            cancelled: true,
            ..DispatchReport::default()
        };
        let err = check_report(&cancelled).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &DispatchReport::default()).unwrap();
        let parsed: DispatchReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, DispatchReport::default());
    }
}
