//! Cooperative cancellation for survey runs.
//!
//! A survey only checks the [`ShutdownCoordinator`] at safe points (between
//! points, and before each outbound image request), so a requested shutdown
//! never leaves a half-written image or ledger row behind. Rate-limit waits
//! and backoff sleeps themselves are not interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Flag shared between the signal handler and a running survey.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Returns whether this call was the first request.
    pub fn request_shutdown(&self) -> bool {
        !self.is_shutdown.swap(true, Ordering::SeqCst)
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

/// Whether an optional handle has been triggered.
pub fn is_requested(shutdown: Option<&SharedShutdown>) -> bool {
    shutdown.is_some_and(|s| s.is_shutdown_requested())
}
