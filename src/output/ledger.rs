//! Append-only download ledger (`downloads.csv`)
//!
//! One row per attempted `(point, heading)`. Rows are flushed and synced as
//! they are written, so after a crash the ledger never mentions an image that
//! is not on disk. The header is only written into an empty file, which makes
//! the ledger safe to reopen for resumed runs in the same directory.

use csv::{ReaderBuilder, Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{DownloadRecord, OutputError, OutputResult};
use crate::{format_coordinate, metrics, Point};

/// Ledger file name inside the output directory.
pub const LEDGER_FILE_NAME: &str = "downloads.csv";

/// Ledger header row.
pub const LEDGER_HEADER: [&str; 6] = ["lat", "lon", "heading", "filename", "status", "source"];

/// Key identifying one `(lat, lon, heading)` attempt, coordinates as written.
pub type LedgerKey = (String, String, u16);

/// CSV row for a download record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Latitude as written
    pub lat: String,
    /// Longitude as written
    pub lon: String,
    /// Heading in degrees
    pub heading: u16,
    /// Saved file name, empty on failure
    pub filename: String,
    /// `OK`, `HTTP_<code>` or a provider status
    pub status: String,
    /// `location`, `pano` or `metadata`
    pub source: String,
}

impl From<&DownloadRecord> for LedgerRow {
    fn from(record: &DownloadRecord) -> Self {
        Self {
            lat: record.lat_str(),
            lon: record.lon_str(),
            heading: record.heading,
            filename: record.filename.clone(),
            status: record.status.to_string(),
            source: record.source.to_string(),
        }
    }
}

impl LedgerRow {
    /// Key of this row
    pub fn key(&self) -> LedgerKey {
        (self.lat.clone(), self.lon.clone(), self.heading)
    }
}

/// Key for an effective point and heading.
pub fn ledger_key(point: &Point, heading: u16) -> LedgerKey {
    (
        format_coordinate(point.lat()),
        format_coordinate(point.lon()),
        heading,
    )
}

/// Append-only writer over `downloads.csv`.
pub struct DownloadLedger {
    writer: Writer<File>,
    path: PathBuf,
    rows_written: u64,
}

impl DownloadLedger {
    /// Open (or create) the ledger inside `output_dir`.
    pub fn open(output_dir: &Path) -> OutputResult<Self> {
        Self::open_path(&output_dir.join(LEDGER_FILE_NAME))
    }

    /// Open (or create) the ledger at an explicit path.
    pub fn open_path(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OutputError::IoError(format!("Failed to open ledger: {e}")))?;
        let is_empty = file
            .metadata()
            .map_err(|e| OutputError::IoError(format!("Failed to stat ledger: {e}")))?
            .len()
            == 0;

        let writer = WriterBuilder::new().has_headers(false).from_writer(file);
        let mut ledger = Self {
            writer,
            path: path.to_path_buf(),
            rows_written: 0,
        };

        if is_empty {
            ledger
                .writer
                .write_record(LEDGER_HEADER)
                .map_err(|e| OutputError::CsvError(format!("Failed to write header: {e}")))?;
            ledger.sync()?;
            debug!("Created ledger with header: {}", path.display());
        } else {
            info!("Appending to existing ledger: {}", path.display());
        }

        Ok(ledger)
    }

    /// Append one record and push it to disk before returning.
    pub fn append(&mut self, record: &DownloadRecord) -> OutputResult<()> {
        let row = LedgerRow::from(record);
        self.writer
            .serialize(&row)
            .map_err(|e| OutputError::CsvError(format!("Failed to write ledger row: {e}")))?;
        self.sync()?;

        self.rows_written += 1;
        metrics::record_ledger_row(&row.status);
        Ok(())
    }

    /// Rows appended through this handle
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Ledger file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush ledger: {e}")))?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| OutputError::IoError(format!("Failed to sync ledger: {e}")))
    }
}

/// Read every row of a ledger file. A missing file reads as empty.
pub fn read_rows(path: &Path) -> OutputResult<Vec<LedgerRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| OutputError::CsvError(format!("Failed to open ledger: {e}")))?;

    reader
        .deserialize()
        .map(|row| row.map_err(|e| OutputError::CsvError(format!("Malformed ledger row: {e}"))))
        .collect()
}

/// Keys of rows that ended in a saved image.
pub fn completed_keys(path: &Path) -> OutputResult<HashSet<LedgerKey>> {
    let keys: HashSet<LedgerKey> = read_rows(path)?
        .iter()
        .filter(|row| row.status == "OK")
        .map(LedgerRow::key)
        .collect();
    debug!("Ledger lists {} completed images", keys.len());
    Ok(keys)
}
