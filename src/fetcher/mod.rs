//! Remote API access: session handling, retries and pagination

use crate::Resource;
use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use std::pin::Pin;

pub mod api_config;
pub mod api_http;
pub mod pagination;
pub mod parser;
pub mod pokemon_api;
pub mod retry;
pub mod retry_formatter;
pub mod session;
pub mod transport;

pub use api_config::ApiConfig;
pub use api_http::ApiHttpClient;
pub use pokemon_api::PokemonApi;
pub use retry::{RetryController, RetryPolicy};
pub use session::{Credentials, Session, SessionManager};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};

/// Fetcher errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetcherError {
    /// Credentials rejected or login response unusable. Never retried.
    #[error("authentication error: {0}")]
    AuthError(String),

    /// HTTP 429 persisted past the retry budget
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Network failure or 5xx persisted past the retry budget
    #[error("transient fetch error after {attempts} attempts: {message}")]
    TransientFetchError {
        /// Attempts made before giving up
        attempts: u32,
        /// Last observed failure
        message: String,
    },

    /// Non-retryable HTTP status
    #[error("HTTP error {status}: {message}")]
    HttpError {
        /// Status code
        status: u16,
        /// Response body or description
        message: String,
    },

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// API contract violation (e.g. runaway pagination)
    #[error("API error: {0}")]
    ApiError(String),

    /// Shutdown requested before the request finished
    #[error("request cancelled")]
    Cancelled,
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy, finite stream of raw records from a list resource
pub type RecordStream = Pin<Box<dyn Stream<Item = FetcherResult<Value>> + Send>>;

/// Source of raw records for the pipeline
#[async_trait]
pub trait DataFetcher: Send + Sync {
    /// Make sure a usable session exists before any resource is fetched
    async fn ensure_session(&self) -> FetcherResult<()>;

    /// Walk every page of a list resource
    ///
    /// # Arguments
    /// * `resource` - List resource to walk
    /// * `page_size` - Records requested per page
    /// * `max_records` - Approximate cap; the page crossing it is returned whole
    fn fetch_all(&self, resource: Resource, page_size: u32, max_records: Option<usize>)
        -> RecordStream;

    /// Fetch a single record by id (`GET <resource>/{id}`)
    async fn fetch_one(&self, resource: Resource, id: i64) -> FetcherResult<Value>;

    /// Page size configured for a list resource
    fn page_size(&self, resource: Resource) -> u32;

    /// Record cap configured for a list resource
    fn max_records(&self, resource: Resource) -> Option<usize>;
}
