//! Sliding-window request rate limiting
//!
//! Keeps the issue instants of recent requests. A new request may go out once
//! fewer than `max_per_minute` of them fall inside the trailing window; until
//! then [`RateLimiter::wait`] sleeps. Waiting is never an error.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::config::RATE_LIMIT_WINDOW;
use crate::metrics;

/// Request-count limiter over a trailing time window.
///
/// Owned by a single [`Session`](super::session::Session); not shared between
/// concurrent surveys.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl RateLimiter {
    /// Limit to `max_per_minute` requests in any trailing 60 seconds.
    ///
    /// A limit of zero is treated as one.
    pub fn new(max_per_minute: usize) -> Self {
        Self::with_window(max_per_minute, RATE_LIMIT_WINDOW)
    }

    /// Limit to `max_requests` per custom `window`.
    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        let max_per_window = max_requests.max(1);
        Self {
            max_per_window,
            window,
            issued: VecDeque::with_capacity(max_per_window.min(1024)),
        }
    }

    /// Configured request cap per window
    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Requests currently counted against the window.
    pub fn in_window(&self) -> usize {
        self.issued.len()
    }

    /// Wait until one more request fits the window, then record it as spent.
    pub async fn wait(&mut self) {
        let now = Instant::now();
        self.evict_expired(now);

        if self.issued.len() >= self.max_per_window {
            if let Some(oldest) = self.issued.front().copied() {
                let delay = self.window.saturating_sub(now.duration_since(oldest));
                if !delay.is_zero() {
                    debug!(
                        delay_ms = delay.as_millis() as u64,
                        in_window = self.issued.len(),
                        "Rate limit window full, waiting"
                    );
                    metrics::record_rate_limit_wait(delay);
                    sleep(delay).await;
                }
            }
            let now = Instant::now();
            self.evict_expired(now);
            // The oldest entry sits exactly on the window edge after the sleep
            while self.issued.len() >= self.max_per_window {
                self.issued.pop_front();
            }
        }

        self.issued.push_back(Instant::now());
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(front) = self.issued.front() {
            if now.duration_since(*front) > self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
    }
}
