//! `run`, `extract` and `transform` commands

use crate::pipeline::{PipelineExecutor, RunReport};
use crate::shutdown::SharedShutdown;
use serde_json::json;
use tracing::{info, warn};

use super::{Cli, CliError, Commands, OutputFormat};

/// Execute one of the pipeline commands
pub async fn execute(cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
    let report = match cli.command {
        Commands::Run => {
            let executor = PipelineExecutor::from_config(&cli.pipeline_config()?)?;
            executor.with_shutdown(shutdown).run().await?
        }
        Commands::Extract => {
            let executor = PipelineExecutor::from_config(&cli.pipeline_config()?)?;
            executor.with_shutdown(shutdown).extract().await?
        }
        Commands::Transform => {
            PipelineExecutor::for_snapshots(&cli.offline_config())
                .with_shutdown(shutdown)
                .transform_only()
                .await?
        }
        Commands::Verify => {
            return Err(CliError::InvalidArgument(
                "verify is not a pipeline command".to_string(),
            ))
        }
    };

    if !report.is_complete() {
        warn!(
            failed = report.write_failures.len(),
            "Some tables could not be written"
        );
    }
    info!(command = cli.command.name(), tables = report.tables_written(), "Command finished");

    match cli.output_format {
        OutputFormat::Json => println!("{}", report_json(cli.command, &report)),
        OutputFormat::Human => print_human(cli.command, &report),
    }
    Ok(())
}

/// JSON rendering of a run report
pub fn report_json(command: Commands, report: &RunReport) -> serde_json::Value {
    let resources: serde_json::Map<String, serde_json::Value> = report
        .resources
        .iter()
        .map(|(resource, outcome)| {
            (
                resource.to_string(),
                json!({
                    "outcome": outcome.to_string(),
                    "records": outcome.records(),
                    "network": outcome.touched_network(),
                }),
            )
        })
        .collect();

    json!({
        "success": true,
        "command": command.name(),
        "complete": report.is_complete(),
        "resources": resources,
        "manifest": report
            .manifest
            .iter()
            .map(|(name, path)| (name.clone(), json!(path.display().to_string())))
            .collect::<serde_json::Map<_, _>>(),
        "write_failures": report.write_failures,
        "warnings": report.warnings.len(),
        "warning_counts": report.warning_counts(),
    })
}

fn print_human(command: Commands, report: &RunReport) {
    println!("\n{} completed", command.name());

    if !report.resources.is_empty() {
        println!("Resources:");
        for (resource, outcome) in &report.resources {
            println!("  {resource}: {outcome}");
        }
    }

    if !report.manifest.is_empty() {
        println!("Tables:");
        for (name, path) in &report.manifest {
            println!("  {name}: {}", path.display());
        }
    }

    if !report.write_failures.is_empty() {
        eprintln!("Write failures:");
        for (name, error) in &report.write_failures {
            eprintln!("  {name}: {error}");
        }
    }

    if !report.warnings.is_empty() {
        let counts: Vec<String> = report
            .warning_counts()
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect();
        println!(
            "Data warnings: {} ({})",
            report.warnings.len(),
            counts.join(", ")
        );
    }
}
