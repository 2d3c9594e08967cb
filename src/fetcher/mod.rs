//! Street View API access
//!
//! Layered bottom-up:
//! - [`HttpTransport`] - one raw GET, implemented over reqwest by [`http::ReqwestTransport`]
//! - [`http::RetryingHttpClient`] - status-code policy, retries and backoff
//! - [`panorama::PanoramaResolver`] - metadata lookup for one point
//! - [`image::ImageFetcher`] - one image request per heading

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub mod http;
pub mod image;
pub mod panorama;
pub mod retry_formatter;
pub mod streetview_config;

use retry_formatter::RetryErrorType;

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Network failure that outlived every retry
    #[error("network error after {attempts} attempts: {message}")]
    NetworkError {
        /// Attempts made, the first included
        attempts: u32,
        /// Last underlying error
        message: String,
    },

    /// HTTP client could not be constructed
    #[error("client setup error: {0}")]
    ClientSetup(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Status, rate-limit hint and body of one HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Retry-After` header value, if any
    pub retry_after: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Response with a status and body and no `Retry-After`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Set the `Retry-After` header value.
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// `Retry-After` as a delay, when it is a number of seconds a
    /// [`Duration`] can represent.
    pub fn retry_after_delay(&self) -> Option<Duration> {
        let secs = self.retry_after.as_deref()?.trim().parse::<f64>().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }
}

/// Failure to get any response at all (connect, timeout, body read).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error_type:?}: {message}")]
pub struct TransportError {
    /// Classification used for retry logging
    pub error_type: RetryErrorType,
    /// Underlying error text
    pub message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(error_type: RetryErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }
}

/// A single unretried HTTP GET.
///
/// The reqwest implementation is used in production; tests substitute
/// scripted transports.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET for `url` with query `params`, giving up after `timeout`.
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}
