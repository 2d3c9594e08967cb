//! Survey orchestration and rate limiting
//!
//! This module drives a survey end to end: it samples the grid, resolves each
//! point to a panorama, fetches every heading and records the outcome.
//!
//! # Overview
//!
//! 1. **Options**: Describe the survey using [`survey::SurveyOptions`]
//! 2. **Execution**: Run it with [`survey::SurveyOrchestrator`]
//! 3. **Rate Limiting**: Sliding-window throttling via [`rate_limit::RateLimiter`]
//! 4. **Budget**: Optional cap on image requests tracked by [`session::Budget`]
//! 5. **Resume Support**: Skip images the ledger already lists as saved
//!
//! # Quick Start
//!
//! ```no_run
//! use streetview_survey::downloader::survey::{SurveyOptions, SurveyOrchestrator};
//! use streetview_survey::fetcher::streetview_config::StreetViewConfig;
//! use streetview_survey::Point;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreetViewConfig::from_env()?;
//! let options = SurveyOptions::default()
//!     .with_headings(vec![0, 180])
//!     .with_skip_completed(true);
//! let orchestrator = SurveyOrchestrator::new(config, options)?;
//!
//! let points = vec![Point::new(40.7128, -74.006)];
//! let summary = orchestrator.run(&points, "./survey_output".as_ref()).await?;
//! assert!(summary.images_saved <= 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`survey`] - Orchestrator, options and run summary
//! - [`session`] - Per-run HTTP client, rate limiter and budget
//! - [`rate_limit`] - Sliding 60-second request window
//! - [`config`] - Configuration constants and backoff calculation
//!
//! # Error Handling
//!
//! Everything returns `Result<T, SurveyError>`. Per-image and coverage
//! failures are recorded in the ledger and never surface here; only
//! configuration problems, unreachable endpoints and local I/O failures do.

pub mod config;
pub mod rate_limit;
pub mod session;
pub mod survey;

pub use rate_limit::RateLimiter;
pub use session::{Budget, Session};
pub use survey::{SurveyOptions, SurveyOrchestrator, SurveySummary};

use crate::fetcher::image::FetchError;
use crate::fetcher::panorama::ResolveError;
use crate::fetcher::streetview_config::ConfigError;
use crate::fetcher::FetcherError;
use crate::grid::{GridError, PointsFileError};
use crate::output::OutputError;

/// Survey errors
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    /// API key or endpoint configuration missing
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Survey options rejected before any request was made
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Bounding box or step rejected by the grid sampler
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Points file could not be read
    #[error("points file error: {0}")]
    PointsFile(#[from] PointsFileError),

    /// An endpoint stayed unreachable after all retries
    #[error("transport error: {0}")]
    Transport(#[from] FetcherError),

    /// Images or ledger could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Output directory could not be prepared
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<ResolveError> for SurveyError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Transport(e) => SurveyError::Transport(e),
        }
    }
}

impl From<FetchError> for SurveyError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(e) => SurveyError::Transport(e),
            FetchError::Output(e) => SurveyError::Output(e),
        }
    }
}

impl SurveyError {
    /// Whether the error was raised before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SurveyError::Configuration(_)
                | SurveyError::InvalidOptions(_)
                | SurveyError::Grid(_)
                | SurveyError::PointsFile(_)
        )
    }
}
