//! Grid sampling over a bounding box
//!
//! Points are produced in row-major order: latitude ascends from `lat_min`,
//! and each latitude row walks longitude from `lon_min` to `lon_max`. Ledger
//! aggregation and test fixtures key on this order, so it must not change.

use crate::{BoundingBox, Point};

pub mod points_file;

pub use points_file::{parse_points_file, PointsFileError};

/// Tolerance so float accumulation does not drop the far boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Grid sampling errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridError {
    /// Bounds are out of order
    #[error("invalid range: lat {lat_min}..{lat_max}, lon {lon_min}..{lon_max} (expected min <= max)")]
    InvalidRange {
        /// Southern bound given
        lat_min: f64,
        /// Northern bound given
        lat_max: f64,
        /// Western bound given
        lon_min: f64,
        /// Eastern bound given
        lon_max: f64,
    },

    /// Step is zero, negative or not finite
    #[error("invalid grid step: {0} (must be a positive number of degrees)")]
    InvalidStep(f64),
}

fn check_inputs(bbox: &BoundingBox, step: f64) -> Result<(), GridError> {
    let bounds = [bbox.lat_min, bbox.lat_max, bbox.lon_min, bbox.lon_max];
    if !bounds.iter().all(|b| b.is_finite()) || !bbox.is_ordered() {
        return Err(GridError::InvalidRange {
            lat_min: bbox.lat_min,
            lat_max: bbox.lat_max,
            lon_min: bbox.lon_min,
            lon_max: bbox.lon_max,
        });
    }
    if !step.is_finite() || step <= 0.0 {
        return Err(GridError::InvalidStep(step));
    }
    // The walk must advance at both ends of each axis or it never terminates
    if bounds.iter().any(|b| b + step == *b) {
        return Err(GridError::InvalidStep(step));
    }
    Ok(())
}

/// Sample `bbox` every `step` degrees, row-major, boundaries inclusive.
///
/// Callers are expected to normalize swapped bounds first
/// ([`BoundingBox::normalized`]); out-of-order or non-finite bounds are
/// rejected, as is a step too small to move a bound.
///
/// Every point is rounded to 6 decimal places. When a bound itself carries
/// more precision, the first or last row or column can fall up to `5e-7`
/// degrees outside the box (`lat_min = 1.0000004` yields a row at `1.0`).
pub fn generate(bbox: &BoundingBox, step: f64) -> Result<Vec<Point>, GridError> {
    estimate_len(bbox, step)?;

    let mut points = Vec::new();
    let mut lat = bbox.lat_min;
    while lat <= bbox.lat_max + BOUNDARY_EPSILON {
        let mut lon = bbox.lon_min;
        while lon <= bbox.lon_max + BOUNDARY_EPSILON {
            points.push(Point::new(lat, lon));
            lon += step;
        }
        lat += step;
    }

    Ok(points)
}

/// Number of points [`generate`] would return, without allocating them.
pub fn estimate_len(bbox: &BoundingBox, step: f64) -> Result<usize, GridError> {
    check_inputs(bbox, step)?;

    let axis_len = |min: f64, max: f64| {
        // Float to int casts saturate, so an absurd span lands on usize::MAX
        let intervals = ((max - min + BOUNDARY_EPSILON) / step).floor() as usize;
        intervals.checked_add(1)
    };
    axis_len(bbox.lat_min, bbox.lat_max)
        .zip(axis_len(bbox.lon_min, bbox.lon_max))
        .and_then(|(rows, cols)| rows.checked_mul(cols))
        .ok_or(GridError::InvalidStep(step))
}
