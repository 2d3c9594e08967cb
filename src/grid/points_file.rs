//! Explicit point lists as an alternative to grid sampling
//!
//! Two layouts are accepted:
//! - CSV with `lat,lon` in the first two columns (extra columns ignored)
//! - JSON array of objects keyed `lat`/`latitude` and `lon`/`longitude`
//!
//! CSV is tried first. Reading stops at the first row whose leading columns
//! are not numeric; if no rows were read by then (a header row, or a JSON
//! document), the file is parsed as JSON instead.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::Point;

/// Points file errors
#[derive(Debug, thiserror::Error)]
pub enum PointsFileError {
    /// File could not be read
    #[error("IO error: {0}")]
    IoError(String),

    /// Neither CSV rows nor a JSON array could be read
    #[error("parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct JsonPoint {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
}

/// Read points from a CSV or JSON file.
pub fn parse_points_file(path: &Path) -> Result<Vec<Point>, PointsFileError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        PointsFileError::IoError(format!("Failed to read {}: {e}", path.display()))
    })?;
    parse_points(&contents)
}

/// Parse points from file contents; see the module docs for accepted layouts.
pub fn parse_points(contents: &str) -> Result<Vec<Point>, PointsFileError> {
    let points = parse_csv_points(contents);
    if !points.is_empty() {
        debug!("Parsed {} points as CSV", points.len());
        return Ok(points);
    }

    let entries: Vec<JsonPoint> = serde_json::from_str(contents).map_err(|e| {
        PointsFileError::ParseError(format!(
            "expected CSV rows of 'lat,lon' or a JSON array of {{lat, lon}} objects: {e}"
        ))
    })?;
    debug!("Parsed {} points as JSON", entries.len());

    Ok(entries
        .into_iter()
        .map(|entry| Point::new(entry.lat, entry.lon))
        .collect())
}

fn parse_csv_points(contents: &str) -> Vec<Point> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut points = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            break;
        };
        if record.len() < 2 {
            continue;
        }
        let lat = record[0].parse::<f64>();
        let lon = record[1].parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => points.push(Point::new(lat, lon)),
            _ => break,
        }
    }
    points
}
