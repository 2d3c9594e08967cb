//! Survey orchestration over a list of sampled points
//!
//! Points are processed strictly one after another. Each point moves through
//! `Pending -> Resolving -> (Skipped | Fetching) -> Done`; a skipped point
//! writes one ledger row per heading carrying the metadata status. The run
//! stops early, without an error, when the request budget is spent or a
//! shutdown is requested. Unreachable endpoints and local write failures
//! abort the run.

use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::config::{
    DEFAULT_FOV, DEFAULT_HEADINGS, DEFAULT_MAX_PER_MINUTE, DEFAULT_MAX_RETRIES, DEFAULT_PITCH,
    DEFAULT_SIZE, DEFAULT_TIMEOUT_SECS, FOLDER_MAX_PER_MINUTE,
};
use super::session::Session;
use super::SurveyError;
use crate::fetcher::http::{ReqwestTransport, RetryingHttpClient};
use crate::fetcher::image::{CameraSettings, ImageFetcher, ImageTarget, StopReason};
use crate::fetcher::panorama::{PanoramaRef, PanoramaResolver};
use crate::fetcher::streetview_config::{load_dotenv, StreetViewConfig};
use crate::fetcher::HttpTransport;
use crate::grid;
use crate::output::ledger::{completed_keys, LedgerKey};
use crate::output::{DownloadLedger, DownloadRecord, LEDGER_FILE_NAME};
use crate::shutdown::SharedShutdown;
use crate::{BoundingBox, Point};

/// Options for one survey run.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyOptions {
    /// Headings requested per point, in order
    pub headings: Vec<u16>,
    /// Image size (width, height)
    pub size: (u32, u32),
    /// Field of view in degrees
    pub fov: u16,
    /// Pitch in degrees
    pub pitch: i16,
    /// Resolve each point through the metadata endpoint first
    pub use_metadata: bool,
    /// Outbound requests allowed in any trailing 60 seconds
    pub max_per_minute: usize,
    /// Cap on image requests for the run; `None` is unlimited
    pub max_requests: Option<u64>,
    /// Retries for network failures and 5xx responses
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Skip headings the existing ledger already lists as saved
    pub skip_completed: bool,
}

impl Default for SurveyOptions {
    fn default() -> Self {
        Self {
            headings: DEFAULT_HEADINGS.to_vec(),
            size: DEFAULT_SIZE,
            fov: DEFAULT_FOV,
            pitch: DEFAULT_PITCH,
            use_metadata: true,
            max_per_minute: DEFAULT_MAX_PER_MINUTE,
            max_requests: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            skip_completed: false,
        }
    }
}

impl SurveyOptions {
    /// Set the headings requested per point
    pub fn with_headings(mut self, headings: Vec<u16>) -> Self {
        self.headings = headings;
        self
    }

    /// Set the image size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Set the field of view
    pub fn with_fov(mut self, fov: u16) -> Self {
        self.fov = fov;
        self
    }

    /// Set the camera pitch
    pub fn with_pitch(mut self, pitch: i16) -> Self {
        self.pitch = pitch;
        self
    }

    /// Enable or disable the metadata pre-check
    pub fn with_metadata(mut self, use_metadata: bool) -> Self {
        self.use_metadata = use_metadata;
        self
    }

    /// Set the sliding-window request rate
    pub fn with_max_per_minute(mut self, max_per_minute: usize) -> Self {
        self.max_per_minute = max_per_minute;
        self
    }

    /// Set the image request budget
    pub fn with_max_requests(mut self, max_requests: Option<u64>) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the retry limit
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable ledger-based resume
    pub fn with_skip_completed(mut self, skip_completed: bool) -> Self {
        self.skip_completed = skip_completed;
        self
    }

    /// Reject options that would produce invalid requests.
    pub fn validate(&self) -> Result<(), SurveyError> {
        if self.headings.is_empty() {
            return Err(SurveyError::InvalidOptions(
                "at least one heading is required".to_string(),
            ));
        }
        if let Some(heading) = self.headings.iter().find(|h| **h >= 360) {
            return Err(SurveyError::InvalidOptions(format!(
                "heading {heading} out of range 0-359"
            )));
        }
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(SurveyError::InvalidOptions(format!(
                "image size {}x{} must be non-zero",
                self.size.0, self.size.1
            )));
        }
        if self.fov == 0 || self.fov > 120 {
            return Err(SurveyError::InvalidOptions(format!(
                "fov {} out of range 1-120",
                self.fov
            )));
        }
        if !(-90..=90).contains(&self.pitch) {
            return Err(SurveyError::InvalidOptions(format!(
                "pitch {} out of range -90..90",
                self.pitch
            )));
        }
        if self.max_per_minute == 0 {
            return Err(SurveyError::InvalidOptions(
                "max_per_minute must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SurveyError::InvalidOptions(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Camera parameters for the image fetcher
    pub fn camera(&self) -> CameraSettings {
        CameraSettings {
            headings: self.headings.clone(),
            size: self.size,
            fov: self.fov,
            pitch: self.pitch,
        }
    }
}

/// Lifecycle of one sampled point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    /// Not yet looked at
    Pending,
    /// Metadata request in flight
    Resolving,
    /// No imagery; metadata rows written
    Skipped,
    /// Image requests in flight
    Fetching,
    /// Every heading attempted
    Done,
}

/// Totals for a finished (or stopped) survey.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurveySummary {
    /// Points handed to the run
    pub points_total: usize,
    /// Points that reached `Done` or `Skipped`
    pub points_processed: usize,
    /// Points skipped for lack of coverage
    pub points_skipped: usize,
    /// Images written to disk
    pub images_saved: usize,
    /// Image requests that did not return an image
    pub images_failed: usize,
    /// Headings skipped because the ledger already listed them as saved
    pub images_already_completed: usize,
    /// Image requests counted against the budget
    pub requests_issued: u64,
    /// Run ended because the budget ran out
    pub budget_exhausted: bool,
    /// Run ended because shutdown was requested
    pub cancelled: bool,
}

/// Runs surveys against the Street View endpoints.
pub struct SurveyOrchestrator {
    config: StreetViewConfig,
    options: SurveyOptions,
    transport: Arc<dyn HttpTransport>,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl SurveyOrchestrator {
    /// Orchestrator over a reqwest transport.
    pub fn new(config: StreetViewConfig, options: SurveyOptions) -> Result<Self, SurveyError> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, options, transport)
    }

    /// Orchestrator over any transport.
    pub fn with_transport(
        config: StreetViewConfig,
        options: SurveyOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SurveyError> {
        options.validate()?;
        Ok(Self {
            config,
            options,
            transport,
            shutdown: None,
            progress: None,
        })
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Report per-point progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sample `bbox` and survey every grid point into `output_dir`.
    pub async fn run_bbox(
        &self,
        bbox: &BoundingBox,
        step: f64,
        output_dir: &Path,
    ) -> Result<SurveySummary, SurveyError> {
        let points = grid::generate(bbox, step)?;
        info!(
            points = points.len(),
            step,
            lat_min = bbox.lat_min,
            lat_max = bbox.lat_max,
            lon_min = bbox.lon_min,
            lon_max = bbox.lon_max,
            "Sampled grid"
        );
        self.run(&points, output_dir).await
    }

    /// Survey `points` in order into `output_dir`.
    pub async fn run(&self, points: &[Point], output_dir: &Path) -> Result<SurveySummary, SurveyError> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            SurveyError::IoError(format!(
                "Failed to create output directory {}: {e}",
                output_dir.display()
            ))
        })?;

        let completed = if self.options.skip_completed {
            let keys = completed_keys(&output_dir.join(LEDGER_FILE_NAME))?;
            info!(completed = keys.len(), "Resuming against existing ledger");
            Some(keys)
        } else {
            None
        };
        let mut ledger = DownloadLedger::open(output_dir)?;

        let client = RetryingHttpClient::new(
            self.transport.clone(),
            self.options.max_retries,
            self.options.timeout,
        );
        let mut session = Session::new(
            client,
            self.options.max_per_minute,
            self.options.max_requests,
        )
        .with_shutdown(self.shutdown.clone());
        let resolver = PanoramaResolver::new(self.config.clone());
        let fetcher = ImageFetcher::new(self.config.clone(), self.options.camera(), output_dir);

        let mut summary = SurveySummary {
            points_total: points.len(),
            ..Default::default()
        };
        if let Some(pb) = &self.progress {
            pb.set_length(points.len() as u64);
        }

        info!(
            points = points.len(),
            headings = self.options.headings.len(),
            use_metadata = self.options.use_metadata,
            output_dir = %output_dir.display(),
            "Starting survey"
        );

        for point in points {
            if session.is_cancelled() {
                info!("Shutdown requested, stopping survey");
                summary.cancelled = true;
                break;
            }
            if session.budget().is_exhausted() {
                info!(
                    issued = session.budget().issued(),
                    remaining_points = summary.points_total - summary.points_processed,
                    "Request budget exhausted, stopping survey"
                );
                summary.budget_exhausted = true;
                break;
            }

            let state = match self
                .process_point(
                    &mut session,
                    &mut ledger,
                    &resolver,
                    &fetcher,
                    point,
                    completed.as_ref(),
                    &mut summary,
                )
                .await
            {
                Ok(state) => state,
                Err(e) => {
                    error!(lat = point.lat(), lon = point.lon(), "Survey aborted: {e}");
                    if let Some(pb) = &self.progress {
                        pb.abandon_with_message("aborted");
                    }
                    return Err(e);
                }
            };

            if state != PointState::Done && state != PointState::Skipped {
                break;
            }
            summary.points_processed += 1;
            if let Some(pb) = &self.progress {
                pb.inc(1);
                pb.set_message(format!("{} saved", summary.images_saved));
            }
        }

        summary.requests_issued = session.budget().issued();
        if let Some(pb) = &self.progress {
            pb.finish_with_message(format!("{} saved", summary.images_saved));
        }

        info!(
            points_total = summary.points_total,
            points_processed = summary.points_processed,
            points_skipped = summary.points_skipped,
            images_saved = summary.images_saved,
            images_failed = summary.images_failed,
            requests_issued = summary.requests_issued,
            budget_exhausted = summary.budget_exhausted,
            cancelled = summary.cancelled,
            "Survey finished"
        );
        Ok(summary)
    }

    /// Drive one point to `Done` or `Skipped`.
    ///
    /// Returns `Fetching` when the heading loop was cut short; the summary's
    /// stop flags say why.
    #[allow(clippy::too_many_arguments)]
    async fn process_point(
        &self,
        session: &mut Session,
        ledger: &mut DownloadLedger,
        resolver: &PanoramaResolver,
        fetcher: &ImageFetcher,
        point: &Point,
        completed: Option<&HashSet<LedgerKey>>,
        summary: &mut SurveySummary,
    ) -> Result<PointState, SurveyError> {
        let mut state = PointState::Pending;
        debug!(lat = point.lat(), lon = point.lon(), ?state, "Processing point");

        let resolved = if self.options.use_metadata {
            state = PointState::Resolving;
            debug!(lat = point.lat(), lon = point.lon(), ?state, "Resolving point");
            resolver.resolve(session, point).await?
        } else {
            PanoramaRef::Ok {
                pano_id: None,
                snapped: *point,
            }
        };

        let (target, effective) = match resolved {
            PanoramaRef::Ok {
                pano_id: Some(id),
                snapped,
            } => (ImageTarget::Pano(id), snapped),
            PanoramaRef::Ok {
                pano_id: None,
                snapped,
            } => (ImageTarget::Location(snapped), snapped),
            other => {
                let status = other.ledger_status();
                warn!(
                    lat = point.lat(),
                    lon = point.lon(),
                    status,
                    "No imagery at point, skipping"
                );
                for &heading in &self.options.headings {
                    ledger.append(&DownloadRecord::skipped(point, heading, status))?;
                }
                summary.points_skipped += 1;
                return Ok(PointState::Skipped);
            }
        };

        state = PointState::Fetching;
        debug!(
            lat = effective.lat(),
            lon = effective.lon(),
            ?state,
            source = %target.source(),
            "Fetching headings"
        );
        let outcome = fetcher
            .fetch(session, ledger, &target, &effective, completed)
            .await?;

        summary.images_saved += outcome.saved();
        summary.images_failed += outcome.failed();
        summary.images_already_completed += outcome.already_completed;

        match outcome.stopped {
            Some(StopReason::BudgetExhausted) => {
                summary.budget_exhausted = true;
                Ok(state)
            }
            Some(StopReason::Cancelled) => {
                summary.cancelled = true;
                Ok(state)
            }
            None => Ok(PointState::Done),
        }
    }
}

/// Survey `bbox` into a fresh temporary directory with default options.
///
/// The API key comes from the environment, after loading any `.env` file
/// without overriding variables already set. A missing key fails before the
/// directory is created. The directory is kept and returned on success and
/// removed on error.
pub async fn generate_folder(bbox: &BoundingBox, step: f64) -> Result<PathBuf, SurveyError> {
    if let Err(e) = load_dotenv() {
        warn!("Ignoring environment file: {e}");
    }
    let config = StreetViewConfig::from_env()?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    generate_folder_with(config, transport, bbox, step, &std::env::temp_dir()).await
}

/// [`generate_folder`] with explicit configuration, transport and parent
/// directory for the `streetview_*` folder.
pub async fn generate_folder_with(
    config: StreetViewConfig,
    transport: Arc<dyn HttpTransport>,
    bbox: &BoundingBox,
    step: f64,
    parent: &Path,
) -> Result<PathBuf, SurveyError> {
    let points = grid::generate(bbox, step)?;
    let options = SurveyOptions::default().with_max_per_minute(FOLDER_MAX_PER_MINUTE);
    let orchestrator = SurveyOrchestrator::with_transport(config, options, transport)?;

    let dir = tempfile::Builder::new()
        .prefix("streetview_")
        .tempdir_in(parent)
        .map_err(|e| SurveyError::IoError(format!("Failed to create temporary directory: {e}")))?;

    // Dropping `dir` on the error path removes it
    let summary = orchestrator.run(&points, dir.path()).await?;
    let path = dir.keep();
    info!(
        path = %path.display(),
        images_saved = summary.images_saved,
        "Survey folder ready"
    );
    Ok(path)
}
