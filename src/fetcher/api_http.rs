//! Authenticated HTTP client for the Pokémon API
//!
//! Every GET goes through the retry controller with the current session and
//! an optional client-side rate limiter.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::retry::RetryController;
use super::session::SessionManager;
use super::transport::{ApiRequest, Transport};
use super::{FetcherError, FetcherResult};
use crate::pipeline::rate_limit::RateLimiter;

/// Client for authenticated GET requests
pub struct ApiHttpClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    sessions: Arc<SessionManager>,
    retry: RetryController,
    timeout: Duration,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ApiHttpClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `transport` - Shared transport
    /// * `base_url` - Base URL without trailing slash
    /// * `sessions` - Session manager shared by every resource
    /// * `retry` - Retry controller for GET requests
    /// * `timeout` - Per-request timeout
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        sessions: Arc<SessionManager>,
        retry: RetryController,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            sessions,
            retry,
            timeout,
            rate_limiter: None,
        }
    }

    /// Pace requests made through [`ApiHttpClient::get_limited`]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Session manager shared with the fetcher
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `endpoint` and deserialize the JSON body
    ///
    /// # Errors
    /// Retry-controller errors are passed through; a body that does not
    /// deserialize into `T` is a [`FetcherError::ParseError`].
    pub async fn get<T>(&self, endpoint: &str, params: &[(&str, String)]) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let label = request_label(endpoint, params);
        let request = ApiRequest::get(url, params, self.timeout);

        debug!(%label, "GET");

        let response = self
            .retry
            .execute_authorized(&label, &self.sessions, |session| {
                let request = request.clone().with_bearer(session.token());
                let transport = Arc::clone(&self.transport);
                async move { transport.send(&request).await }
            })
            .await?;

        serde_json::from_str(&response.body).map_err(|e| {
            FetcherError::ParseError(format!("{label}: failed to deserialize response: {e}"))
        })
    }

    /// Like [`ApiHttpClient::get`], after taking a slot from the rate limiter
    pub async fn get_limited<T>(&self, endpoint: &str, params: &[(&str, String)]) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter
                .acquire()
                .await
                .map_err(|e| FetcherError::ApiError(format!("rate limiter error: {e}")))?;
        }
        self.get(endpoint, params).await
    }
}

fn request_label(endpoint: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return format!("GET {endpoint}");
    }
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("GET {endpoint} {query}")
}
