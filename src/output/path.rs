//! Image filename grammar
//!
//! `lat_<lat>_lon_<lon>_hdg_<heading>_<source>.jpg`
//!
//! Downstream consumers locate images with
//! `lat_([-0-9.]+)_lon_([-0-9.]+)_hdg_([0-9]+)`; any change to this grammar
//! breaks every consumer.

use once_cell::sync::Lazy;
use regex::Regex;

use super::RecordSource;
use crate::{format_coordinate, Point};

/// Pattern consumers use to pull coordinates and heading out of a filename.
pub const CONSUMER_PATTERN: &str = r"lat_([-0-9.]+)_lon_([-0-9.]+)_hdg_([0-9]+)";

static CONSUMER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(CONSUMER_PATTERN).unwrap_or_else(|e| panic!("invalid filename pattern: {e}"))
});

/// Coordinates and heading recovered from an image filename.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedImageName {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
    /// Heading in degrees
    pub heading: u16,
}

/// Filename for an image taken at `point` facing `heading`.
pub fn image_filename(point: &Point, heading: u16, source: RecordSource) -> String {
    format!(
        "lat_{}_lon_{}_hdg_{}_{}.jpg",
        format_coordinate(point.lat()),
        format_coordinate(point.lon()),
        heading,
        source
    )
}

/// Parse a filename with the consumer pattern. `None` if it does not match.
pub fn parse_image_filename(name: &str) -> Option<ParsedImageName> {
    let caps = CONSUMER_REGEX.captures(name)?;
    Some(ParsedImageName {
        lat: caps[1].parse().ok()?,
        lon: caps[2].parse().ok()?,
        heading: caps[3].parse().ok()?,
    })
}
