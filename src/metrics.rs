//! Survey observability metrics
//!
//! Counters and histograms for outbound requests, retries, rate-limit waits,
//! budget consumption and ledger outcomes. Recording is always cheap: without
//! an installed recorder the `metrics` macros are no-ops, so library users and
//! tests pay nothing unless the binary calls [`init_metrics`].
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Optional Prometheus exporter for a scrape endpoint (`--metrics-addr`)

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the Prometheus exporter on `addr`.
///
/// Idempotent: later calls are ignored once an exporter is installed.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to Street View endpoints"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a slot in the 60 second request window"
    );
    describe_gauge!(
        "survey_requests_issued",
        Unit::Count,
        "Image requests issued by the current survey"
    );
    describe_gauge!(
        "survey_requests_remaining",
        Unit::Count,
        "Image requests left before the survey budget is exhausted"
    );
    describe_counter!(
        "ledger_rows_total",
        Unit::Count,
        "Ledger rows written, by status"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one completed HTTP exchange.
pub fn record_http_request(endpoint: &str, status: u16, duration: Duration) {
    counter!(
        "http_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
    )
    .record(duration.as_secs_f64());

    if status == 429 {
        counter!(
            "http_429_errors_total",
            "endpoint" => endpoint.to_string(),
        )
        .increment(1);
    }

    debug!(
        endpoint,
        status,
        duration_ms = duration.as_millis() as u64,
        "HTTP request completed"
    );
}

/// Record a request that never produced a response.
pub fn record_network_error(endpoint: &str, duration: Duration) {
    counter!(
        "http_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => "network_error",
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!(
        "retry_backoff_duration_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());

    debug!(
        attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record time spent blocked on the rate-limit window.
pub fn record_rate_limit_wait(duration: Duration) {
    histogram!("rate_limit_wait_seconds").record(duration.as_secs_f64());

    if duration >= Duration::from_secs(1) {
        debug!(
            wait_ms = duration.as_millis() as u64,
            "Waiting for rate limit window"
        );
    }
}

/// Record budget consumption after an image request.
pub fn record_budget(issued: u64, max: Option<u64>) {
    gauge!("survey_requests_issued").set(issued as f64);

    if let Some(max) = max {
        let remaining = max.saturating_sub(issued);
        gauge!("survey_requests_remaining").set(remaining as f64);

        // Warn once, on the request that crosses 80%
        if max > 0 && issued * 5 >= max * 4 && issued.saturating_sub(1) * 5 < max * 4 {
            warn!(issued, max, "Request budget is 80% consumed");
        }
    }
}

/// Record one ledger row by its status column.
pub fn record_ledger_row(status: &str) {
    counter!(
        "ledger_rows_total",
        "status" => status.to_string(),
    )
    .increment(1);
}
