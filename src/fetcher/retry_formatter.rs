//! Retry message formatting for the Street View HTTP client.
//!
//! Keeps retry, recovery and give-up log lines consistent across metadata and
//! image requests, and carries the classification used to pick a backoff.

use reqwest::Error as ReqwestError;
use std::time::Duration;

/// Classification of retry-triggering errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429 rate limit exceeded
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// User-friendly description string used inside retry log messages.
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
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation shown when retries run out.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection or raise --timeout",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower --max-per-minute or check the API project quota",
            Self::ServerError(_) => "The imagery service may be degraded, try again later",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether this failure counts against the retry limit. 429s do not.
    pub fn counts_against_retries(&self) -> bool {
        !matches!(self, Self::RateLimit)
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum attempts for retry-limited failures
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// URL that failed
    pub endpoint: String,
    /// Original error message for details
    pub error_message: String,
}

impl RetryContext {
    /// Convenience constructor used by the retry loop.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        endpoint: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            endpoint: endpoint.into(),
            error_message: error_message.into(),
        }
    }

    /// Format the message logged before sleeping for the next attempt.
    pub fn format_retry(&self) -> String {
        let counter = if self.error_type.counts_against_retries() {
            format!("attempt {}/{}", self.attempt, self.max_attempts)
        } else {
            format!("attempt {}", self.attempt)
        };
        format!(
            "Retrying ({counter}) after {} - waiting {:.1} seconds... ({})",
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.endpoint
        )
    }

    /// Format the message logged when an attempt after a retry succeeds.
    pub fn format_success(&self) -> String {
        format!(
            "Retry attempt {} succeeded ({})",
            self.attempt, self.endpoint
        )
    }

    /// Format the multi-line summary logged when retries are exhausted.
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] Request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Endpoint: {}", self.endpoint),
            "  Suggestions:".to_string(),
            format!("    - {}", self.error_type.suggestion()),
            format!(
                "    - Try increasing --max-retries (current: {})",
                self.max_attempts.saturating_sub(1)
            ),
        ]
        .join("\n")
    }
}

/// Classify a reqwest failure that produced no response.
pub fn classify_reqwest_error(err: &ReqwestError) -> RetryErrorType {
    if err.is_timeout() {
        RetryErrorType::NetworkTimeout
    } else if err.is_connect() {
        RetryErrorType::NetworkOffline
    } else {
        RetryErrorType::NetworkGeneric
    }
}

/// Classify a retryable HTTP status.
pub fn classify_status(status: u16) -> Option<RetryErrorType> {
    match status {
        429 => Some(RetryErrorType::RateLimit),
        500..=599 => Some(RetryErrorType::ServerError(status)),
        _ => None,
    }
}
