//! Command line surface

use assert_cmd::Command;
use pokemon_etl::store::{FsRawStore, RawStore, RefreshMode};
use pokemon_etl::Resource;
use serde_json::json;
use tempfile::TempDir;

const API_ENV: [&str; 4] = ["BASE_URL", "API_USERNAME", "API_PASSWORD", "FORCE_REFRESH"];

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("pokemon-etl").unwrap();
    for var in API_ENV {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "error");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn seed_snapshots(dir: &TempDir) {
    let store = FsRawStore::new(dir.path(), RefreshMode::Reuse);
    store
        .save(
            Resource::PokemonAttributes,
            &[
                json!({"id": 1, "name": "Bulbasaur", "types": "Grass/Poison", "attack": 49}),
                json!({"id": 4, "name": "Charmander", "types": "Fire", "attack": 52}),
            ],
        )
        .unwrap();
    store
        .save(
            Resource::Combats,
            &[json!({"first_pokemon": 1, "second_pokemon": 4, "winner": 4})],
        )
        .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let output = cli().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    for command in ["run", "extract", "transform", "verify"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_run_without_base_url_fails() {
    let output = cli().arg("run").output().unwrap();
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("BASE_URL is not set"));
}

#[test]
fn test_max_retries_out_of_range_is_rejected() {
    let output = cli()
        .args(["run", "--max-retries", "21"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_verify_empty_directory() {
    let raw = TempDir::new().unwrap();
    let output = cli()
        .args(["verify", "--raw-dir"])
        .arg(raw.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("No snapshots found"));
}

#[test]
fn test_verify_reports_invalid_snapshot_as_json() {
    let raw = TempDir::new().unwrap();
    seed_snapshots(&raw);
    std::fs::write(raw.path().join("pokemon_basic.json"), "{ broken").unwrap();

    let output = cli()
        .args(["verify", "--output-format", "json", "--raw-dir"])
        .arg(raw.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_str(stdout_of(&output).trim()).unwrap();
    assert_eq!(report["success"], false);
    let files = report["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(
        files.iter().filter(|f| f["valid"] == true).count(),
        2
    );
    assert!(stderr_of(&output).contains("1 invalid snapshot"));
}

#[test]
fn test_transform_builds_tables_from_snapshots() {
    let raw = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_snapshots(&raw);

    let output = cli()
        .arg("transform")
        .arg("--raw-dir")
        .arg(raw.path())
        .arg("--output-dir")
        .arg(out.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr_of(&output));
    let stats = std::fs::read_to_string(out.path().join("pokemon_stats.csv")).unwrap();
    assert!(stats.contains("4,Charmander,1,0,1,1.0,Fire,52"));
    for file in [
        "pokemon.csv",
        "combats.csv",
        "pokemon_by_type.csv",
        "top10_winners.csv",
        "top10_losers.csv",
    ] {
        assert!(out.path().join(file).exists(), "{file} missing");
    }
    assert!(stdout_of(&output).contains("transform completed"));
}

#[test]
fn test_transform_without_snapshots_fails() {
    let raw = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let output = cli()
        .arg("transform")
        .arg("--raw-dir")
        .arg(raw.path())
        .arg("--output-dir")
        .arg(out.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("run `extract` first"));
}
