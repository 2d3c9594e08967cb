//! Multi-heading image fetching for one resolved point
//!
//! Per heading, in order: stop if the budget is spent or a shutdown was
//! requested, wait for the rate limiter, GET the image, count it against the
//! budget, then either save the body and record `OK` or record `HTTP_<code>`.
//! Each record goes to the ledger before the next heading is requested.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::streetview_config::StreetViewConfig;
use super::FetcherError;
use crate::downloader::config::{DEFAULT_FOV, DEFAULT_HEADINGS, DEFAULT_PITCH, DEFAULT_SIZE};
use crate::downloader::session::Session;
use crate::output::ledger::{ledger_key, LedgerKey};
use crate::output::path::image_filename;
use crate::output::{save_image, DownloadLedger, DownloadRecord, OutputError, RecordSource};
use crate::Point;

/// What an image request is addressed to. Exactly one mode per request.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageTarget {
    /// Provider panorama id
    Pano(String),
    /// Raw coordinate
    Location(Point),
}

impl ImageTarget {
    /// Ledger/filename source for this addressing mode
    pub fn source(&self) -> RecordSource {
        match self {
            ImageTarget::Pano(_) => RecordSource::Pano,
            ImageTarget::Location(_) => RecordSource::Location,
        }
    }
}

/// Camera parameters shared by every request of a survey.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Headings in degrees, requested in this order
    pub headings: Vec<u16>,
    /// Image size (width, height) in pixels
    pub size: (u32, u32),
    /// Field of view in degrees
    pub fov: u16,
    /// Pitch in degrees
    pub pitch: i16,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            headings: DEFAULT_HEADINGS.to_vec(),
            size: DEFAULT_SIZE,
            fov: DEFAULT_FOV,
            pitch: DEFAULT_PITCH,
        }
    }
}

/// One image request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Heading in degrees (0-359)
    pub heading: u16,
    /// Field of view in degrees
    pub fov: u16,
    /// Pitch in degrees
    pub pitch: i16,
    /// Image size (width, height)
    pub size: (u32, u32),
    /// Addressing mode
    pub target: ImageTarget,
}

impl ImageRequest {
    /// Query parameters for this request.
    pub fn query_params(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("key", api_key.to_string()),
            ("size", format!("{}x{}", self.size.0, self.size.1)),
            ("heading", self.heading.to_string()),
            ("fov", self.fov.to_string()),
            ("pitch", self.pitch.to_string()),
        ];
        match &self.target {
            ImageTarget::Pano(id) => params.push(("pano", id.clone())),
            ImageTarget::Location(point) => params.push(("location", point.as_query())),
        }
        params
    }
}

/// Image fetching errors that abort the survey
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Image endpoint unreachable after all retries
    #[error("image request failed: {0}")]
    Transport(#[from] FetcherError),

    /// Image or ledger could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Why a heading loop ended before its last heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The request budget ran out
    BudgetExhausted,
    /// Shutdown was requested
    Cancelled,
}

/// Result of fetching all headings for one point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Records written to the ledger, in heading order
    pub records: Vec<DownloadRecord>,
    /// Headings skipped because the ledger already had them
    pub already_completed: usize,
    /// Set when the loop stopped early
    pub stopped: Option<StopReason>,
}

impl FetchOutcome {
    /// Images saved
    pub fn saved(&self) -> usize {
        self.records.iter().filter(|r| r.is_saved()).count()
    }

    /// Requests that did not return an image
    pub fn failed(&self) -> usize {
        self.records.len() - self.saved()
    }
}

/// Issues image requests and stores their results.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    config: StreetViewConfig,
    camera: CameraSettings,
    output_dir: PathBuf,
}

impl ImageFetcher {
    /// Create a fetcher writing images into `output_dir`.
    pub fn new(config: StreetViewConfig, camera: CameraSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            camera,
            output_dir: output_dir.into(),
        }
    }

    /// Request for one heading against `target`.
    pub fn request_for(&self, target: &ImageTarget, heading: u16) -> ImageRequest {
        ImageRequest {
            heading,
            fov: self.camera.fov,
            pitch: self.camera.pitch,
            size: self.camera.size,
            target: target.clone(),
        }
    }

    /// Issue one image request and save the body on 200.
    ///
    /// `effective` is the coordinate the filename and record are built from.
    /// The caller is responsible for checking the budget first.
    pub async fn fetch_one(
        &self,
        session: &mut Session,
        request: &ImageRequest,
        effective: &Point,
    ) -> Result<DownloadRecord, FetchError> {
        let params = request.query_params(self.config.api_key());
        let response = session.limited_get(&self.config.image_url, &params).await?;
        session.record_request();

        let source = request.target.source();
        if response.status == 200 {
            let filename = image_filename(effective, request.heading, source);
            save_image(&self.output_dir, &filename, &response.body).await?;
            debug!(
                lat = effective.lat(),
                lon = effective.lon(),
                heading = request.heading,
                bytes = response.body.len(),
                "Saved {filename}"
            );
            Ok(DownloadRecord::saved(effective, request.heading, filename, source))
        } else {
            warn!(
                lat = effective.lat(),
                lon = effective.lon(),
                heading = request.heading,
                status = response.status,
                "Image request failed"
            );
            Ok(DownloadRecord::http_failure(
                effective,
                request.heading,
                response.status,
                source,
            ))
        }
    }

    /// Fetch every configured heading for one point, appending each record to
    /// `ledger` as it is produced.
    ///
    /// Headings whose key is in `completed` are skipped without a request.
    pub async fn fetch(
        &self,
        session: &mut Session,
        ledger: &mut DownloadLedger,
        target: &ImageTarget,
        effective: &Point,
        completed: Option<&HashSet<LedgerKey>>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();

        for &heading in &self.camera.headings {
            if completed.is_some_and(|keys| keys.contains(&ledger_key(effective, heading))) {
                debug!(
                    lat = effective.lat(),
                    lon = effective.lon(),
                    heading,
                    "Already in ledger, skipping"
                );
                outcome.already_completed += 1;
                continue;
            }
            if session.budget().is_exhausted() {
                info!(
                    issued = session.budget().issued(),
                    "Request budget exhausted, stopping"
                );
                outcome.stopped = Some(StopReason::BudgetExhausted);
                break;
            }
            if session.is_cancelled() {
                outcome.stopped = Some(StopReason::Cancelled);
                break;
            }

            let request = self.request_for(target, heading);
            let record = self.fetch_one(session, &request, effective).await?;
            ledger.append(&record)?;
            outcome.records.push(record);
        }

        Ok(outcome)
    }
}
