//! Survey configuration constants

use std::time::Duration;

/// Retries allowed for network failures and 5xx responses (429s are not counted).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Connect timeout in seconds, applied inside the overall request timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Rate limit for interactive runs (requests per trailing minute).
pub const DEFAULT_MAX_PER_MINUTE: usize = 60;

/// Rate limit used by [`crate::generate_folder`], sized for the paid API quota.
pub const FOLDER_MAX_PER_MINUTE: usize = 30_000;

/// Grid step in degrees (about 222 m of latitude).
pub const DEFAULT_GRID_STEP: f64 = 0.002;

/// Headings captured at every point, in degrees.
pub const DEFAULT_HEADINGS: [u16; 4] = [0, 90, 180, 270];

/// Image size (width, height) in pixels.
pub const DEFAULT_SIZE: (u32, u32) = (640, 640);

/// Horizontal field of view in degrees.
pub const DEFAULT_FOV: u16 = 90;

/// Camera pitch in degrees.
pub const DEFAULT_PITCH: i16 = 0;

/// Backoff cap for network failures and 5xx responses.
pub const NETWORK_BACKOFF_CAP_SECS: u64 = 10;

/// Backoff cap for 429 responses without a `Retry-After` header.
pub const RATE_LIMIT_BACKOFF_CAP_SECS: u64 = 60;

/// Width of the sliding rate-limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Exponential backoff `min(2^attempt, cap)` seconds, `attempt` being 1-based.
pub fn calculate_backoff(attempt: u32, cap_secs: u64) -> Duration {
    let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX).min(cap_secs);
    Duration::from_secs(secs)
}
