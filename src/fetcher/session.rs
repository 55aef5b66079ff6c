//! Credential exchange and single-flight session refresh
//!
//! A [`Session`] is an owned value handed to each request. A refresh never
//! mutates a session in place: it produces a new one with a higher
//! generation. Concurrent callers that observed a 401 on the same stale
//! session share one login through the manager's mutex.

use super::retry::RetryController;
use super::transport::{ApiRequest, Transport};
use super::{FetcherError, FetcherResult};
use crate::metrics::record_session_refresh;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Keys that may carry the bearer token in a login response, in lookup order
const TOKEN_KEYS: [&str; 3] = ["access_token", "token", "jwt"];

/// Bearer token obtained from the login endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    issued_at: DateTime<Utc>,
    generation: u64,
}

impl Session {
    /// Wrap a token issued now
    pub fn new(token: impl Into<String>, generation: u64) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
            generation,
        }
    }

    /// Bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the token was obtained
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Monotonic login counter; a refresh always yields a higher value
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Login credentials
#[derive(Clone)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Owns the current session and performs (re-)authentication
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    login_url: String,
    credentials: Credentials,
    retry: RetryController,
    timeout: Duration,
    current: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a manager; no request is made until a session is needed
    pub fn new(
        transport: Arc<dyn Transport>,
        login_url: impl Into<String>,
        credentials: Credentials,
        retry: RetryController,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            login_url: login_url.into(),
            credentials,
            retry,
            timeout,
            current: Mutex::new(None),
        }
    }

    /// Exchange credentials for a new session
    ///
    /// A 400/401/403 or a success body without a token is an [`FetcherError::AuthError`]
    /// and is never retried. Network failures, 429 and 5xx go through the retry
    /// controller like any other request.
    pub async fn authenticate(&self, generation: u64) -> FetcherResult<Session> {
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        let request = ApiRequest::post_json(&self.login_url, body, self.timeout);

        let response = self
            .retry
            .execute("POST /login", || self.transport.send(&request))
            .await
            .map_err(|e| match e {
                FetcherError::HttpError { status, message } if matches!(status, 400 | 403) => {
                    FetcherError::AuthError(format!("login rejected ({status}): {message}"))
                }
                other => other,
            })?;

        let token = extract_token(&response.body)?;
        let session = Session::new(token, generation);
        info!(
            username = %self.credentials.username,
            generation,
            "Authenticated"
        );
        Ok(session)
    }

    /// Return the current session, logging in first if there is none
    pub async fn ensure_valid(&self) -> FetcherResult<Session> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            return Ok(session.clone());
        }

        let session = self.authenticate(1).await?;
        *current = Some(session.clone());
        Ok(session)
    }

    /// Replace a session the server rejected
    ///
    /// Single-flight: if another caller already replaced `stale` while this one
    /// waited for the lock, the newer session is returned without a login.
    pub async fn refresh(&self, stale: &Session) -> FetcherResult<Session> {
        let mut current = self.current.lock().await;
        if let Some(session) = current.as_ref() {
            if session.generation() > stale.generation() {
                debug!(
                    stale = stale.generation(),
                    current = session.generation(),
                    "Session already refreshed, reusing"
                );
                return Ok(session.clone());
            }
        }

        let generation = current
            .as_ref()
            .map_or(stale.generation(), Session::generation)
            + 1;
        let session = self.authenticate(generation).await?;
        record_session_refresh(generation);
        *current = Some(session.clone());
        Ok(session)
    }

    /// Current session without triggering a login
    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("login_url", &self.login_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Pull the bearer token out of a login response body
pub fn extract_token(body: &str) -> FetcherResult<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetcherError::AuthError(format!("login response is not JSON: {e}")))?;

    TOKEN_KEYS
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FetcherError::AuthError("no access token in login response".to_string()))
}
