//! `verify` command

use crate::store::{FsRawStore, RefreshMode, VerifyEntry};
use serde_json::json;
use tracing::{error, info};

use super::{Cli, CliError, OutputFormat};

/// Check every snapshot in the raw directory
pub fn execute(cli: &Cli) -> Result<(), CliError> {
    let store = FsRawStore::new(&cli.raw_dir, RefreshMode::Reuse);
    let entries = store.verify_all()?;

    if entries.is_empty() {
        info!(dir = %store.dir().display(), "No snapshots to verify");
    }

    match cli.output_format {
        OutputFormat::Json => println!("{}", entries_json(&entries)),
        OutputFormat::Human => print_human(&store, &entries),
    }

    let invalid = entries.iter().filter(|e| e.outcome.is_err()).count();
    if invalid > 0 {
        return Err(CliError::VerifyFailed { invalid });
    }

    info!("Verify passed: {} valid snapshot file(s)", entries.len());
    Ok(())
}

fn entries_json(entries: &[VerifyEntry]) -> serde_json::Value {
    let files: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| match &entry.outcome {
            Ok((resource, records, fetched_at)) => json!({
                "path": entry.path.display().to_string(),
                "valid": true,
                "resource": resource.to_string(),
                "records": records,
                "fetched_at": fetched_at.to_rfc3339(),
            }),
            Err(e) => json!({
                "path": entry.path.display().to_string(),
                "valid": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    json!({
        "success": entries.iter().all(|e| e.outcome.is_ok()),
        "files": files,
    })
}

fn print_human(store: &FsRawStore, entries: &[VerifyEntry]) {
    if entries.is_empty() {
        println!("No snapshots found in {}", store.dir().display());
        return;
    }

    for entry in entries {
        match &entry.outcome {
            Ok((resource, records, fetched_at)) => {
                println!(
                    "OK       {} ({resource}, {records} records, fetched {})",
                    entry.path.display(),
                    fetched_at.to_rfc3339()
                );
            }
            Err(e) => {
                error!(path = %entry.path.display(), error = %e, "Invalid snapshot");
                println!("INVALID  {}: {e}", entry.path.display());
            }
        }
    }
}
