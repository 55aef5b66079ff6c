//! Pipeline configuration

use crate::fetcher::ApiConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of retries per logical request.
/// Six attempts in total; with the 30 s ceiling the worst-case wait is about a minute.
pub const MAX_RETRIES: u32 = 5;

/// Delay before the first retry in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Ceiling for any single backoff wait in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Detail requests (`GET /pokemon/{id}`) allowed per [`DETAIL_RATE_WINDOW`].
pub const DETAIL_REQUESTS_PER_WINDOW: usize = 20;

/// Window of the client-side detail request limiter.
pub const DETAIL_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Default directory for raw snapshots
pub const DEFAULT_RAW_DIR: &str = "data/raw";

/// Default directory for CSV outputs
pub const DEFAULT_OUTPUT_DIR: &str = "data/processed";

/// Everything one pipeline run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// API connection settings
    pub api: ApiConfig,
    /// Directory holding raw snapshots
    pub raw_dir: PathBuf,
    /// Directory receiving CSV outputs
    pub output_dir: PathBuf,
    /// Re-fetch every resource even when a snapshot exists
    pub force_refresh: bool,
    /// Retry budget per logical request
    pub max_retries: u32,
    /// Detail requests allowed per window
    pub detail_requests_per_window: usize,
}

impl PipelineConfig {
    /// Configuration with default retry budget and detail pacing
    pub fn new(api: ApiConfig, raw_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            raw_dir: raw_dir.into(),
            output_dir: output_dir.into(),
            force_refresh: false,
            max_retries: MAX_RETRIES,
            detail_requests_per_window: DETAIL_REQUESTS_PER_WINDOW,
        }
    }

    /// Toggle full re-extraction
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Override the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override detail request pacing
    pub fn with_detail_rate(mut self, requests_per_window: usize) -> Self {
        self.detail_requests_per_window = requests_per_window.max(1);
        self
    }
}
