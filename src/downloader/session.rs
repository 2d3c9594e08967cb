//! Per-run session state
//!
//! A [`Session`] is built for exactly one survey run and handed explicitly to
//! the resolver and fetcher. It owns the HTTP client, the rate-limit window and
//! the request budget, so nothing leaks between runs.

use tracing::info;

use super::rate_limit::RateLimiter;
use crate::fetcher::http::RetryingHttpClient;
use crate::fetcher::{FetcherResult, HttpResponse};
use crate::metrics;
use crate::shutdown::{self, SharedShutdown};

/// Cap on image requests for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    issued: u64,
    max: Option<u64>,
}

impl Budget {
    /// Budget with an optional maximum; `None` is unlimited.
    pub fn new(max: Option<u64>) -> Self {
        Self { issued: 0, max }
    }

    /// Count one issued request.
    pub fn record(&mut self) {
        self.issued += 1;
        metrics::record_budget(self.issued, self.max);
    }

    /// Requests counted so far
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Configured maximum
    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// Requests left, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.max.map(|max| max.saturating_sub(self.issued))
    }

    /// Whether no further request may be issued.
    pub fn is_exhausted(&self) -> bool {
        self.max.is_some_and(|max| self.issued >= max)
    }
}

/// Mutable state for one survey run.
pub struct Session {
    client: RetryingHttpClient,
    limiter: RateLimiter,
    budget: Budget,
    shutdown: Option<SharedShutdown>,
}

impl Session {
    /// Create a session around an HTTP client, a rate limit and a budget.
    pub fn new(client: RetryingHttpClient, max_per_minute: usize, max_requests: Option<u64>) -> Self {
        info!(
            max_per_minute,
            max_requests = ?max_requests,
            max_retries = client.max_retries(),
            "Starting survey session"
        );
        Self {
            client,
            limiter: RateLimiter::new(max_per_minute),
            budget: Budget::new(max_requests),
            shutdown: None,
        }
    }

    /// Attach a shutdown handle checked at safe points.
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Wait for a rate-limit slot, then issue a GET through the retrying client.
    pub async fn limited_get(
        &mut self,
        url: &str,
        params: &[(&str, String)],
    ) -> FetcherResult<HttpResponse> {
        self.limiter.wait().await;
        self.client.get(url, params).await
    }

    /// Request budget
    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    /// Count one image request against the budget.
    pub fn record_request(&mut self) {
        self.budget.record();
    }

    /// Whether a shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        shutdown::is_requested(self.shutdown.as_ref())
    }
}
