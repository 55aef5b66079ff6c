//! Retry classification and log message formatting.
//!
//! The retry controller decides *what* to do with a failed attempt; this module
//! names the failure and renders consistent messages for the logs.

use super::transport::{ApiResponse, TransportError};
use std::time::Duration;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure or similar
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 401, the session needs a refresh
    Unauthorized,
    /// Other 4xx
    ClientError(u16),
    /// Anything else below HTTP
    NetworkGeneric,
}

impl RetryErrorType {
    /// Classify a transport result. Returns `None` for 2xx responses.
    pub fn classify(result: &Result<ApiResponse, TransportError>) -> Option<Self> {
        match result {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some(Self::from_status(response.status)),
            Err(error) => Some(Self::from_transport(error)),
        }
    }

    /// Classify a failure below the HTTP layer
    pub fn from_transport(error: &TransportError) -> Self {
        match error {
            TransportError::Timeout(_) => Self::NetworkTimeout,
            TransportError::Connect(_) => Self::NetworkOffline,
            TransportError::Other(_) => Self::NetworkGeneric,
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            429 => Self::RateLimit,
            500..=599 => Self::ServerError(status),
            _ => Self::ClientError(status),
        }
    }

    /// Short description used inside log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::Unauthorized => "session expired (401)",
            Self::ClientError(code) => match code {
                400 => "invalid request",
                403 => "forbidden",
                404 => "resource not found",
                _ => "client error",
            },
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown after the budget is exhausted
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify BASE_URL and DNS resolution",
            Self::RateLimit => "Lower MAX_COMBATS or re-run later once the API quota resets",
            Self::ServerError(_) => "The API may be experiencing issues, try again later",
            Self::Unauthorized => "Verify API_USERNAME and API_PASSWORD",
            Self::ClientError(_) => "Review the request parameters",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether the controller waits and tries again on this failure
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthorized | Self::ClientError(_))
    }

    /// Whether this is the rate-limit failure
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit)
    }
}

/// Context for formatting retry messages
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempt that just failed (1-based)
    pub attempt: u32,
    /// Total attempts allowed
    pub max_attempts: u32,
    /// Failure classification
    pub error_type: RetryErrorType,
    /// Delay before the next attempt
    pub backoff_duration: Duration,
    /// Request label, e.g. "GET /combats page=3"
    pub label: String,
    /// Underlying error message
    pub error_message: String,
}

impl RetryContext {
    /// Build a context for one failed attempt
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        label: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            label: label.into(),
            error_message: error_message.into(),
        }
    }

    /// "Retrying (attempt 2/6) after rate limit exceeded - waiting 2.0 seconds... (GET /combats)"
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.label
        )
    }

    /// Multi-line failure summary with a suggestion
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] {} failed after {} attempts", self.label, self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Suggestion: {}", self.error_type.suggestion()),
        ]
        .join("\n")
    }
}
