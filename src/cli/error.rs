//! CLI error types and conversions

use crate::pipeline::PipelineError;
use crate::store::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Pipeline error
    #[error("{0}")]
    PipelineError(#[from] PipelineError),

    /// Store error
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Snapshot verification found unusable files
    #[error("verify failed: {invalid} invalid snapshot file(s) found; re-run with --force-refresh to replace them")]
    VerifyFailed {
        /// Number of invalid files
        invalid: usize,
    },
}
