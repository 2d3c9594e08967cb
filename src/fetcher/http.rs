//! Retrying HTTP client shared by metadata and image requests
//!
//! Status policy, evaluated per attempt:
//! - network failure: retry with `min(2^attempt, 10)`s backoff while retries
//!   remain, then fail with [`FetcherError::NetworkError`]
//! - 200 / 404: returned at once (404 is a valid "not found" answer)
//! - 429: always retried, never counted against `max_retries`; honours a
//!   numeric `Retry-After`, else `min(2^attempt, 60)`s
//! - 5xx: retried like network failures, but once retries run out the last
//!   response is returned instead of an error
//! - anything else: returned unmodified
//!
//! The 5xx/network asymmetry separates "the server said no" from "the server
//! could not be reached"; callers log the former as a per-image failure and
//! abort the run on the latter.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::retry_formatter::{classify_reqwest_error, classify_status, RetryContext, RetryErrorType};
use super::{FetcherError, FetcherResult, HttpResponse, HttpTransport, TransportError};
use crate::downloader::config::{
    calculate_backoff, DEFAULT_CONNECT_TIMEOUT_SECS, NETWORK_BACKOFF_CAP_SECS,
    RATE_LIMIT_BACKOFF_CAP_SECS,
};
use crate::metrics;

/// [`HttpTransport`] over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with the default connect timeout.
    pub fn new() -> FetcherResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetcherError::ClientSetup(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::new(classify_reqwest_error(&e), e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(classify_reqwest_error(&e), e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// HTTP GET with bounded retry, backoff and status-code policy.
#[derive(Clone)]
pub struct RetryingHttpClient {
    transport: Arc<dyn HttpTransport>,
    max_retries: u32,
    timeout: Duration,
}

impl RetryingHttpClient {
    /// Create a client over any transport.
    pub fn new(transport: Arc<dyn HttpTransport>, max_retries: u32, timeout: Duration) -> Self {
        Self {
            transport,
            max_retries,
            timeout,
        }
    }

    /// Retries allowed for network failures and 5xx responses
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// GET with the client's configured retry limit and timeout.
    pub async fn get(&self, url: &str, params: &[(&str, String)]) -> FetcherResult<HttpResponse> {
        self.get_with(url, params, self.max_retries, self.timeout).await
    }

    /// GET with an explicit retry limit and timeout.
    pub async fn get_with(
        &self,
        url: &str,
        params: &[(&str, String)],
        max_retries: u32,
        timeout: Duration,
    ) -> FetcherResult<HttpResponse> {
        let max_attempts = max_retries + 1;
        let mut attempt: u32 = 0;
        let mut retries_used: u32 = 0;
        let mut retried = false;

        loop {
            attempt += 1;
            let started = Instant::now();
            debug!(url, attempt, "Sending GET request");

            let response = match self.transport.get(url, params, timeout).await {
                Ok(response) => response,
                Err(err) => {
                    metrics::record_network_error(url, started.elapsed());
                    if retries_used < max_retries {
                        retries_used += 1;
                        let backoff = calculate_backoff(attempt, NETWORK_BACKOFF_CAP_SECS);
                        let ctx = RetryContext::new(
                            retries_used + 1,
                            max_attempts,
                            err.error_type,
                            backoff,
                            url,
                            err.message,
                        );
                        warn!("{}", ctx.format_retry());
                        metrics::record_retry_backoff(backoff, attempt);
                        tokio::time::sleep(backoff).await;
                        retried = true;
                        continue;
                    }

                    let ctx = RetryContext::new(
                        attempt,
                        max_attempts,
                        err.error_type,
                        Duration::ZERO,
                        url,
                        err.message.clone(),
                    );
                    error!("{}", ctx.format_failure());
                    return Err(FetcherError::NetworkError {
                        attempts: attempt,
                        message: err.message,
                    });
                }
            };

            metrics::record_http_request(url, response.status, started.elapsed());

            let backoff = match classify_status(response.status) {
                None => {
                    if retried {
                        let ctx = RetryContext::new(
                            attempt,
                            max_attempts,
                            RetryErrorType::NetworkGeneric,
                            Duration::ZERO,
                            url,
                            "",
                        );
                        info!("{}", ctx.format_success());
                    }
                    return Ok(response);
                }
                Some(RetryErrorType::RateLimit) => response
                    .retry_after_delay()
                    .unwrap_or_else(|| calculate_backoff(attempt, RATE_LIMIT_BACKOFF_CAP_SECS)),
                Some(kind) => {
                    if retries_used >= max_retries {
                        let ctx = RetryContext::new(
                            attempt,
                            max_attempts,
                            kind,
                            Duration::ZERO,
                            url,
                            format!("HTTP {}", response.status),
                        );
                        warn!("{}", ctx.format_failure());
                        return Ok(response);
                    }
                    retries_used += 1;
                    calculate_backoff(attempt, NETWORK_BACKOFF_CAP_SECS)
                }
            };

            let kind = classify_status(response.status).unwrap_or(RetryErrorType::NetworkGeneric);
            let shown_attempt = if kind.counts_against_retries() {
                retries_used + 1
            } else {
                attempt + 1
            };
            let ctx = RetryContext::new(
                shown_attempt,
                max_attempts,
                kind,
                backoff,
                url,
                format!("HTTP {}", response.status),
            );
            warn!("{}", ctx.format_retry());
            metrics::record_retry_backoff(backoff, attempt);
            tokio::time::sleep(backoff).await;
            retried = true;
        }
    }
}
