//! Retry/backoff controller
//!
//! Every request runs through a small state machine:
//!
//! ```text
//! ATTEMPT ──2xx──────────────▶ DONE
//!    │ ──429/5xx/network──▶ WAIT ──▶ ATTEMPT      (bounded by max_retries)
//!    │ ──401 (once)───────▶ REFRESH_SESSION ──▶ ATTEMPT
//!    └──other 4xx / budget exhausted / 2nd 401──▶ FAILED
//! ```
//!
//! [`RetryMachine`] holds the transitions and is free of I/O. [`RetryController`]
//! drives it: it performs the attempts, sleeps through an injectable
//! [`Sleeper`], refreshes the session and watches the shutdown signal.

use super::retry_formatter::{RetryContext, RetryErrorType};
use super::session::{Session, SessionManager};
use super::transport::{ApiResponse, TransportError};
use super::{FetcherError, FetcherResult};
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};
use crate::pipeline::config::{INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES};
use crate::shutdown::{self, SharedShutdown};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest response body excerpt carried into error messages
const BODY_EXCERPT_LEN: usize = 200;

/// Retry budget and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling for any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Override the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override base delay and ceiling
    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Total attempts allowed for one logical request
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential delay before retry number `retry` (0-based), capped at the ceiling
    pub fn backoff(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry `retry`; a server-provided `Retry-After` wins over the curve
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(server_delay) => server_delay.min(self.max_delay),
            None => self.backoff(retry),
        }
    }
}

/// States of a single logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// About to send (or sending) an attempt
    Attempt,
    /// Waiting before the next attempt
    Wait(Duration),
    /// The session was rejected and must be replaced before the next attempt
    RefreshSession,
    /// A 2xx response was received
    Done,
    /// Unrecoverable failure or budget exhausted
    Failed,
}

/// What the driver must do next
#[derive(Debug)]
pub enum Transition {
    /// Hand the response to the caller
    Done(ApiResponse),
    /// Sleep for `context.backoff_duration`, then attempt again
    Wait(RetryContext),
    /// Replace the session, then attempt again
    RefreshSession,
    /// Give up with this error
    Failed(FetcherError),
}

/// Pure transition logic for one logical request
#[derive(Debug)]
pub struct RetryMachine {
    policy: RetryPolicy,
    label: String,
    retries: u32,
    session_refresh_available: bool,
    state: RetryState,
}

impl RetryMachine {
    /// Create a machine. `can_refresh_session` is false for the login call itself.
    pub fn new(policy: RetryPolicy, label: impl Into<String>, can_refresh_session: bool) -> Self {
        Self {
            policy,
            label: label.into(),
            retries: 0,
            session_refresh_available: can_refresh_session,
            state: RetryState::Attempt,
        }
    }

    /// Current state
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Backoff retries consumed so far (session refreshes are not counted)
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// 1-based number of the attempt being made within the backoff budget
    pub fn attempt_number(&self) -> u32 {
        self.retries + 1
    }

    /// Mark the wait or refresh as finished
    pub fn resume(&mut self) {
        if matches!(self.state, RetryState::Wait(_) | RetryState::RefreshSession) {
            self.state = RetryState::Attempt;
        }
    }

    /// Feed the outcome of an attempt and get the next step
    pub fn advance(&mut self, result: Result<ApiResponse, TransportError>) -> Transition {
        let (error_type, retry_after, message) = match result {
            Ok(response) if response.is_success() => {
                self.state = RetryState::Done;
                return Transition::Done(response);
            }
            Ok(response) => (
                RetryErrorType::from_status(response.status),
                response.retry_after,
                format!("HTTP {}: {}", response.status, excerpt(&response.body)),
            ),
            Err(error) => (RetryErrorType::from_transport(&error), None, error.to_string()),
        };

        match error_type {
            RetryErrorType::Unauthorized if self.session_refresh_available => {
                self.session_refresh_available = false;
                self.state = RetryState::RefreshSession;
                Transition::RefreshSession
            }
            RetryErrorType::Unauthorized => {
                self.state = RetryState::Failed;
                Transition::Failed(FetcherError::AuthError(format!(
                    "{} rejected with 401: {message}",
                    self.label
                )))
            }
            RetryErrorType::ClientError(status) => {
                self.state = RetryState::Failed;
                Transition::Failed(FetcherError::HttpError { status, message })
            }
            retryable if self.retries < self.policy.max_retries => {
                let server_delay = if retryable.is_rate_limit() {
                    retry_after
                } else {
                    None
                };
                let delay = self.policy.delay(self.retries, server_delay);
                let context = RetryContext::new(
                    self.attempt_number(),
                    self.policy.max_attempts(),
                    retryable,
                    delay,
                    self.label.clone(),
                    message,
                );
                self.retries += 1;
                self.state = RetryState::Wait(delay);
                Transition::Wait(context)
            }
            exhausted => {
                self.state = RetryState::Failed;
                let attempts = self.attempt_number();
                let context = RetryContext::new(
                    attempts,
                    self.policy.max_attempts(),
                    exhausted,
                    Duration::ZERO,
                    self.label.clone(),
                    message.clone(),
                );
                warn!("{}", context.format_failure());

                if exhausted.is_rate_limit() {
                    Transition::Failed(FetcherError::RateLimitExceeded { attempts })
                } else {
                    Transition::Failed(FetcherError::TransientFetchError { attempts, message })
                }
            }
        }
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

/// Delay source used between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real delays on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives [`RetryMachine`] for real requests
#[derive(Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Option<SharedShutdown>,
}

impl RetryController {
    /// Controller with real sleeps, attached to the global shutdown handle if one is set
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Replace the delay source
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach a shutdown handle checked before each attempt and during waits
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run an unauthenticated request (the login call). A 401 fails immediately.
    pub async fn execute<A, AF>(&self, label: &str, mut attempt: A) -> FetcherResult<ApiResponse>
    where
        A: FnMut() -> AF,
        AF: Future<Output = Result<ApiResponse, TransportError>>,
    {
        let mut machine = RetryMachine::new(self.policy, label, false);
        loop {
            self.check_cancelled()?;
            let metrics = HttpRequestMetrics::start(label, machine.attempt_number());
            let result = attempt().await;
            metrics.record(&result);

            match machine.advance(result) {
                Transition::Done(response) => return Ok(response),
                Transition::Wait(context) => self.wait(&context).await?,
                Transition::RefreshSession => {
                    return Err(FetcherError::AuthError(format!(
                        "{label} cannot refresh a session"
                    )))
                }
                Transition::Failed(error) => return Err(error),
            }
            machine.resume();
        }
    }

    /// Run an authenticated request. A 401 triggers one session refresh that
    /// does not consume the backoff budget; a second 401 fails with an auth error.
    pub async fn execute_authorized<A, AF>(
        &self,
        label: &str,
        sessions: &SessionManager,
        mut attempt: A,
    ) -> FetcherResult<ApiResponse>
    where
        A: FnMut(Session) -> AF,
        AF: Future<Output = Result<ApiResponse, TransportError>>,
    {
        self.check_cancelled()?;
        let mut session = sessions.ensure_valid().await?;
        let mut machine = RetryMachine::new(self.policy, label, true);
        loop {
            self.check_cancelled()?;
            let metrics = HttpRequestMetrics::start(label, machine.attempt_number());
            let result = attempt(session.clone()).await;
            metrics.record(&result);

            match machine.advance(result) {
                Transition::Done(response) => return Ok(response),
                Transition::Wait(context) => self.wait(&context).await?,
                Transition::RefreshSession => {
                    warn!(label, generation = session.generation(), "Session rejected, refreshing");
                    session = sessions.refresh(&session).await?;
                }
                Transition::Failed(error) => return Err(error),
            }
            machine.resume();
        }
    }

    fn check_cancelled(&self) -> FetcherResult<()> {
        match &self.shutdown {
            Some(shutdown) if shutdown.is_shutdown_requested() => Err(FetcherError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn wait(&self, context: &RetryContext) -> FetcherResult<()> {
        warn!("{}", context.format_retry());
        record_retry_backoff(context.backoff_duration, context.attempt);

        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = self.sleeper.sleep(context.backoff_duration) => {}
                    _ = shutdown.wait_for_shutdown() => {
                        debug!(label = %context.label, "Shutdown requested during backoff");
                        return Err(FetcherError::Cancelled);
                    }
                }
            }
            None => self.sleeper.sleep(context.backoff_duration).await,
        }

        Ok(())
    }
}
