//! Extraction and transformation orchestration
//!
//! A run goes session → extract (store or API) → transform → write. Fetch and
//! store failures abort the run before anything is written; write failures are
//! isolated per table and reported in the [`RunReport`].

use crate::fetcher::FetcherError;
use crate::store::StoreError;
use crate::Resource;

pub mod config;
pub mod executor;
pub mod rate_limit;
pub mod report;

pub use config::PipelineConfig;
pub use executor::{Extraction, PipelineExecutor};
pub use rate_limit::RateLimiter;
pub use report::{ResourceOutcome, RunReport};

/// Pipeline errors, tagged with the stage and resource involved
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Configuration rejected before any request
    #[error("configuration error: {0}")]
    Config(String),

    /// Fetching a resource failed past the retry budget
    #[error("extract {resource} failed: {source}")]
    Fetch {
        /// Resource being fetched
        resource: Resource,
        /// Underlying fetch error
        #[source]
        source: FetcherError,
    },

    /// Reading or replacing a snapshot failed
    #[error("store {resource} failed: {source}")]
    Store {
        /// Resource whose snapshot was involved
        resource: Resource,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Transform requested without a snapshot to read
    #[error("no usable {resource} snapshot; run `extract` first")]
    MissingSnapshot {
        /// Resource without a snapshot
        resource: Resource,
    },

    /// Shutdown requested during the run
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap a fetch error, keeping cancellation distinct
    pub fn fetch(resource: Resource, source: FetcherError) -> Self {
        match source {
            FetcherError::Cancelled => Self::Cancelled,
            source => Self::Fetch { resource, source },
        }
    }

    /// Wrap a store error
    pub fn store(resource: Resource, source: StoreError) -> Self {
        Self::Store { resource, source }
    }

    /// Stage the error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Fetch { .. } => "extract",
            Self::Store { .. } | Self::MissingSnapshot { .. } => "store",
            Self::Cancelled => "cancelled",
        }
    }

    /// Resource involved, if any
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Self::Fetch { resource, .. }
            | Self::Store { resource, .. }
            | Self::MissingSnapshot { resource } => Some(*resource),
            Self::Config(_) | Self::Cancelled => None,
        }
    }

    /// Whether the underlying failure was an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                source: FetcherError::AuthError(_),
                ..
            }
        )
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
