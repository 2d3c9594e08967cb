//! Survey outputs: image files and the download ledger

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::{format_coordinate, Point};

pub mod ledger;
pub mod path;

pub use ledger::{DownloadLedger, LEDGER_FILE_NAME};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write or read error
    #[error("CSV error: {0}")]
    CsvError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// How an image was addressed, or `Metadata` when the point was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSource {
    /// Image requested by raw coordinate
    Location,
    /// Image requested by panorama id
    Pano,
    /// No image requested; the metadata lookup decided
    Metadata,
}

impl RecordSource {
    /// Ledger and filename spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Location => "location",
            RecordSource::Pano => "pano",
            RecordSource::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome column of a ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// Image saved
    Ok,
    /// Image request answered with a non-200 status
    Http(u16),
    /// Metadata lookup status (`ZERO_RESULTS`, `ERROR`, ...)
    Provider(String),
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Ok => f.write_str("OK"),
            RecordStatus::Http(code) => write!(f, "HTTP_{code}"),
            RecordStatus::Provider(status) => f.write_str(status),
        }
    }
}

/// One attempted `(point, heading)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRecord {
    /// Effective latitude (snapped when resolved)
    pub lat: f64,
    /// Effective longitude (snapped when resolved)
    pub lon: f64,
    /// Camera heading in degrees
    pub heading: u16,
    /// Saved file name; empty unless the image was saved
    pub filename: String,
    /// Outcome
    pub status: RecordStatus,
    /// Addressing mode
    pub source: RecordSource,
}

impl DownloadRecord {
    /// Record for a saved image.
    pub fn saved(point: &Point, heading: u16, filename: String, source: RecordSource) -> Self {
        Self {
            lat: point.lat(),
            lon: point.lon(),
            heading,
            filename,
            status: RecordStatus::Ok,
            source,
        }
    }

    /// Record for an image request that did not return 200.
    pub fn http_failure(point: &Point, heading: u16, code: u16, source: RecordSource) -> Self {
        Self {
            lat: point.lat(),
            lon: point.lon(),
            heading,
            filename: String::new(),
            status: RecordStatus::Http(code),
            source,
        }
    }

    /// Record for a heading never requested because metadata found no imagery.
    pub fn skipped(point: &Point, heading: u16, provider_status: &str) -> Self {
        Self {
            lat: point.lat(),
            lon: point.lon(),
            heading,
            filename: String::new(),
            status: RecordStatus::Provider(provider_status.to_string()),
            source: RecordSource::Metadata,
        }
    }

    /// Whether the image was saved.
    pub fn is_saved(&self) -> bool {
        self.status == RecordStatus::Ok
    }

    /// Latitude as written to the ledger
    pub fn lat_str(&self) -> String {
        format_coordinate(self.lat)
    }

    /// Longitude as written to the ledger
    pub fn lon_str(&self) -> String {
        format_coordinate(self.lon)
    }
}

/// Write image bytes to `dir/filename`, synced before returning.
pub async fn save_image(dir: &Path, filename: &str, bytes: &[u8]) -> OutputResult<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

    let path = dir.join(filename);
    let mut file = File::create(&path)
        .await
        .map_err(|e| OutputError::IoError(format!("Failed to create {}: {e}", path.display())))?;
    file.write_all(bytes)
        .await
        .map_err(|e| OutputError::IoError(format!("Failed to write {}: {e}", path.display())))?;
    file.sync_all()
        .await
        .map_err(|e| OutputError::IoError(format!("Failed to sync {}: {e}", path.display())))?;

    Ok(path)
}
