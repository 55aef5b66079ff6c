//! Run metrics
//!
//! Counters and histograms for HTTP attempts, retries, session refreshes,
//! extracted records and written tables. Recording is always cheap; nothing
//! is exported unless [`init_metrics`] installed the Prometheus listener.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::fetcher::{ApiResponse, TransportError};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Install the Prometheus exporter and register metric descriptions
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Address of the scrape endpoint (e.g. "127.0.0.1:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if METRICS_INITIALIZED.get().is_some() {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "HTTP attempts made against the Pokémon API"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Rate limit responses received"
    );
    describe_counter!("http_retries_total", Unit::Count, "Backoff retries taken");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP attempt duration"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff wait before a retry"
    );
    describe_counter!(
        "session_refreshes_total",
        Unit::Count,
        "Logins performed to replace a rejected session"
    );
    describe_counter!(
        "records_extracted_total",
        Unit::Count,
        "Raw records extracted per resource"
    );
    describe_counter!(
        "etl_runs_completed_total",
        Unit::Count,
        "Pipeline runs that finished extraction and transform"
    );
    describe_counter!(
        "etl_runs_failed_total",
        Unit::Count,
        "Pipeline runs aborted by an error"
    );
    describe_counter!(
        "tables_written_total",
        Unit::Count,
        "Output tables written, labelled by outcome"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Whether the exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Next correlation id for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP attempt
pub struct HttpRequestMetrics {
    endpoint: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start timing an attempt
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt,
            "Sending request"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record the outcome of the attempt
    pub fn record(&self, result: &Result<ApiResponse, TransportError>) {
        match result {
            Ok(response) => self.record_complete(response.status),
            Err(_) => self.record_network_error(),
        }
    }

    /// Record an attempt that produced an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            counter!(
                "http_429_errors_total",
                "endpoint" => self.endpoint.clone(),
            )
            .increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                attempt = self.attempt,
                duration_ms = duration.as_millis(),
                "Rate limited (429)"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            status = status_code,
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    /// Record an attempt that failed below HTTP
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => "network_error",
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "endpoint" => self.endpoint.clone(),
        )
        .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            duration_ms = duration.as_millis(),
            "Network error"
        );
    }

    /// Correlation id of this attempt
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a backoff wait before retry `attempt`
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total").increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());

    debug!(
        attempt,
        backoff_ms = duration.as_millis(),
        "Retry backoff recorded"
    );
}

/// Record a session refresh (re-login)
pub fn record_session_refresh(generation: u64) {
    counter!("session_refreshes_total").increment(1);
    debug!(generation, "Session refresh recorded");
}

/// Record records extracted for a resource
pub fn record_extracted(resource: &str, count: usize) {
    counter!("records_extracted_total", "resource" => resource.to_string())
        .increment(count as u64);
}

/// Record one table write and whether it succeeded
pub fn record_table_written(table: &str, success: bool) {
    counter!(
        "tables_written_total",
        "table" => table.to_string(),
        "outcome" => if success { "ok" } else { "failed" },
    )
    .increment(1);
}

/// Tracks one pipeline run from start to outcome
pub struct RunMetrics {
    command: &'static str,
    start_time: Instant,
}

impl RunMetrics {
    /// Start tracking a run of `command`
    pub fn start(command: &'static str) -> Self {
        info!(command, "Pipeline run started");
        Self {
            command,
            start_time: Instant::now(),
        }
    }

    /// Record a run that completed
    pub fn record_success(&self, tables_written: usize, warnings: usize) {
        counter!("etl_runs_completed_total", "command" => self.command).increment(1);
        info!(
            command = self.command,
            tables_written,
            warnings,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Pipeline run completed"
        );
    }

    /// Record a run that failed
    pub fn record_failure(&self, error: &str) {
        counter!("etl_runs_failed_total", "command" => self.command).increment(1);
        error!(
            command = self.command,
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Pipeline run failed"
        );
    }
}
