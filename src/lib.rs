//! # Street View Survey Library
//!
//! Grid-sampled acquisition of Street View imagery for a geographic area.
//! Designed to feed downstream hazard-detection and mapping pipelines with a
//! predictable directory of images plus an auditable record of every attempt.
//!
//! ## Features
//!
//! - **Deterministic Sampling**: Row-major grid over a bounding box, stable to 6 decimal places
//! - **Panorama Resolution**: Optional metadata pre-check that snaps points to real captures
//! - **Rate Limiting**: Sliding 60-second request window per survey session
//! - **Retry Policy**: Bounded exponential backoff with `Retry-After` support for 429s
//! - **Request Budget**: Optional hard cap on image requests per run
//! - **Audit Ledger**: Append-only `downloads.csv`, flushed per row, safe to resume against
//!
//! ## Quick Start
//!
//! ```no_run
//! use streetview_survey::downloader::survey::{SurveyOptions, SurveyOrchestrator};
//! use streetview_survey::fetcher::streetview_config::StreetViewConfig;
//! use streetview_survey::BoundingBox;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreetViewConfig::from_env()?;
//! let options = SurveyOptions::default().with_max_requests(Some(100));
//! let orchestrator = SurveyOrchestrator::new(config, options)?;
//!
//! let bbox = BoundingBox::new(40.7120, 40.7140, -74.0070, -74.0050);
//! let summary = orchestrator
//!     .run_bbox(&bbox, 0.001, "./survey_output".as_ref())
//!     .await?;
//! println!("saved {} images", summary.images_saved);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`grid`] - Grid sampling and points-file input
//! - [`fetcher`] - HTTP transport, retry policy, panorama resolution and image fetching
//! - [`downloader`] - Rate limiting, per-run session state and survey orchestration
//! - [`output`] - Image filenames and the download ledger
//! - [`shutdown`] - Cooperative cancellation between requests
//! - [`metrics`] - Request, retry and outcome counters
//! - [`cli`] - Command-line front end

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Rate limiting, sessions and survey orchestration
pub mod downloader;

/// HTTP transport and Street View API clients
pub mod fetcher;

/// Grid sampling and point inputs
pub mod grid;

/// Observability counters
pub mod metrics;

/// Image files and download ledger
pub mod output;

/// Cooperative shutdown shared between the CLI and a running survey
pub mod shutdown;

pub use downloader::survey::{generate_folder, SurveyOptions, SurveyOrchestrator, SurveySummary};
pub use output::path::{image_filename, parse_image_filename};

/// Decimal places kept on every coordinate.
pub const COORDINATE_PRECISION: i32 = 6;

/// Round a coordinate to [`COORDINATE_PRECISION`] decimal places.
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() / scale
}

/// Render a coordinate the way it appears in filenames, queries and the ledger.
///
/// Shortest round-trip decimal form, never scientific notation, and integral
/// values keep a trailing `.0` (`1.0`, not `1`).
pub fn format_coordinate(value: f64) -> String {
    let rendered = value.to_string();
    if rendered.contains('.') || !value.is_finite() {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

/// A sampled WGS84 coordinate, rounded at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    lat: f64,
    lon: f64,
}

impl Point {
    /// Create a point, rounding both axes to 6 decimal places.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: round_coordinate(lat),
            lon: round_coordinate(lon),
        }
    }

    /// Latitude in degrees
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// `"lat,lon"` form used by the `location` query parameter.
    pub fn as_query(&self) -> String {
        format!(
            "{},{}",
            format_coordinate(self.lat),
            format_coordinate(self.lon)
        )
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {})",
            format_coordinate(self.lat),
            format_coordinate(self.lon)
        )
    }
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge
    pub lat_min: f64,
    /// Northern edge
    pub lat_max: f64,
    /// Western edge
    pub lon_min: f64,
    /// Eastern edge
    pub lon_max: f64,
}

impl BoundingBox {
    /// Create a bounding box. Bounds are taken as given; see [`BoundingBox::normalized`].
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Copy with swapped bounds put back in min/max order.
    pub fn normalized(&self) -> Self {
        Self {
            lat_min: self.lat_min.min(self.lat_max),
            lat_max: self.lat_min.max(self.lat_max),
            lon_min: self.lon_min.min(self.lon_max),
            lon_max: self.lon_min.max(self.lon_max),
        }
    }

    /// Whether the box's bounds are already ordered.
    pub fn is_ordered(&self) -> bool {
        self.lat_min <= self.lat_max && self.lon_min <= self.lon_max
    }

    /// Whether `point` lies inside the box, edges included.
    pub fn contains(&self, point: &Point) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.lat())
            && (self.lon_min..=self.lon_max).contains(&point.lon())
    }
}
