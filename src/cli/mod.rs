//! CLI command implementations

use crate::fetcher::ApiConfig;
use crate::pipeline::config::{DEFAULT_OUTPUT_DIR, DEFAULT_RAW_DIR, MAX_RETRIES};
use crate::pipeline::PipelineConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

pub mod error;
pub mod run;
pub mod verify;

pub use error::CliError;

/// Pokémon ETL CLI
#[derive(Parser, Debug)]
#[command(name = "pokemon-etl")]
#[command(about = "Extract Pokémon API data and build combat statistics tables", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the Pokémon API
    #[arg(long, global = true, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// API user name
    #[arg(long, global = true, env = "API_USERNAME")]
    pub username: Option<String>,

    /// API password
    #[arg(long, global = true, env = "API_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Approximate number of combats to extract
    #[arg(long, global = true, env = "MAX_COMBATS", default_value_t = crate::fetcher::api_config::DEFAULT_MAX_COMBATS)]
    pub max_combats: usize,

    /// Re-fetch every resource even when a snapshot exists
    #[arg(long, global = true, env = "FORCE_REFRESH")]
    pub force_refresh: bool,

    /// Directory holding raw snapshots
    #[arg(long, global = true, env = "RAW_DIR", default_value = DEFAULT_RAW_DIR)]
    pub raw_dir: PathBuf,

    /// Directory receiving the CSV tables
    #[arg(long, global = true, env = "OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Maximum number of retries for failed requests (default: 5, range: 1-20)
    #[arg(long, global = true, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Serve Prometheus metrics on this address
    #[arg(long, global = true, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,
}

/// CLI commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Extract every resource, then build all tables
    Run,

    /// Refresh the raw snapshots only
    Extract,

    /// Build the tables from existing snapshots
    Transform,

    /// Check every snapshot in the raw directory
    Verify,
}

impl Commands {
    /// Name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run => "run",
            Commands::Extract => "extract",
            Commands::Transform => "transform",
            Commands::Verify => "verify",
        }
    }
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl Cli {
    /// API settings; fails when a value needed to reach the API is missing
    pub fn api_config(&self) -> Result<ApiConfig, CliError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CliError::ConfigurationError(format!("{name} is not set")))
        };

        let config = ApiConfig::new(
            required(&self.base_url, "BASE_URL")?,
            required(&self.username, "API_USERNAME")?,
            required(&self.password, "API_PASSWORD")?,
        )
        .with_max_combats(self.max_combats);
        config.validate().map_err(CliError::ConfigurationError)?;
        Ok(config)
    }

    /// Pipeline settings for commands that talk to the API
    pub fn pipeline_config(&self) -> Result<PipelineConfig, CliError> {
        Ok(self.with_paths(self.api_config()?))
    }

    /// Pipeline settings for commands that only read snapshots
    pub fn offline_config(&self) -> PipelineConfig {
        let api = ApiConfig::new(
            self.base_url.clone().unwrap_or_default(),
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        );
        self.with_paths(api)
    }

    fn with_paths(&self, api: ApiConfig) -> PipelineConfig {
        PipelineConfig::new(api, &self.raw_dir, &self.output_dir)
            .with_force_refresh(self.force_refresh)
            .with_max_retries(self.max_retries)
    }
}
