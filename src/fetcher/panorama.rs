//! Panorama resolution through the metadata endpoint
//!
//! One metadata request per sampled point decides whether imagery exists
//! nearby. When it does, the provider's panorama id and capture location are
//! used for the image requests instead of the raw sampled coordinate.

use serde::Deserialize;
use tracing::{debug, warn};

use super::streetview_config::StreetViewConfig;
use super::FetcherError;
use crate::downloader::session::Session;
use crate::Point;

/// Provider status meaning imagery was found.
pub const STATUS_OK: &str = "OK";

/// Ledger status for a metadata body that could not be parsed.
pub const STATUS_ERROR: &str = "ERROR";

/// Ledger status for a metadata body without a `status` field.
pub const STATUS_UNKNOWN: &str = "UNKNOWN";

/// Resolution outcome for one sampled point.
#[derive(Debug, Clone, PartialEq)]
pub enum PanoramaRef {
    /// Imagery exists; fetch relative to it
    Ok {
        /// Provider panorama id, when the response carried one
        pano_id: Option<String>,
        /// Capture location, or the input point if none was returned
        snapped: Point,
    },
    /// Provider answered with a non-OK status (`ZERO_RESULTS`, `NOT_FOUND`, ...)
    NoCoverage {
        /// Status string as returned
        status: String,
    },
    /// Response body was not a usable metadata document
    Error {
        /// HTTP status of the unparsable response
        http_status: u16,
    },
}

impl PanoramaRef {
    /// Status string recorded in the ledger for this outcome.
    pub fn ledger_status(&self) -> &str {
        match self {
            PanoramaRef::Ok { .. } => STATUS_OK,
            PanoramaRef::NoCoverage { status } => status,
            PanoramaRef::Error { .. } => STATUS_ERROR,
        }
    }

    /// Whether image requests should follow.
    pub fn is_ok(&self) -> bool {
        matches!(self, PanoramaRef::Ok { .. })
    }
}

/// Resolution errors that abort the survey
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Metadata endpoint unreachable after all retries
    #[error("metadata request failed: {0}")]
    Transport(#[from] FetcherError),
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    status: Option<String>,
    pano_id: Option<String>,
    location: Option<MetadataLocation>,
}

#[derive(Debug, Deserialize)]
struct MetadataLocation {
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Map a metadata response body to a [`PanoramaRef`].
pub fn interpret_metadata(point: &Point, http_status: u16, body: &[u8]) -> PanoramaRef {
    let metadata: MetadataResponse = match serde_json::from_slice(body) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(
                lat = point.lat(),
                lon = point.lon(),
                http_status,
                "Unparsable metadata response: {e}"
            );
            return PanoramaRef::Error { http_status };
        }
    };

    let status = metadata
        .status
        .unwrap_or_else(|| STATUS_UNKNOWN.to_string());
    if status != STATUS_OK {
        return PanoramaRef::NoCoverage { status };
    }

    let location = metadata.location.as_ref();
    let lat = location.and_then(|l| l.lat).unwrap_or(point.lat());
    let lon = location.and_then(|l| l.lng).unwrap_or(point.lon());

    PanoramaRef::Ok {
        pano_id: metadata.pano_id.filter(|id| !id.is_empty()),
        snapped: Point::new(lat, lon),
    }
}

/// Looks up the nearest panorama for a point.
#[derive(Debug, Clone)]
pub struct PanoramaResolver {
    config: StreetViewConfig,
}

impl PanoramaResolver {
    /// Create a resolver for the configured metadata endpoint.
    pub fn new(config: StreetViewConfig) -> Self {
        Self { config }
    }

    /// Query parameters for a metadata lookup at `point`.
    pub fn metadata_params(&self, point: &Point) -> Vec<(&'static str, String)> {
        vec![
            ("key", self.config.api_key().to_string()),
            ("location", point.as_query()),
        ]
    }

    /// Issue one metadata request for `point`.
    pub async fn resolve(
        &self,
        session: &mut Session,
        point: &Point,
    ) -> Result<PanoramaRef, ResolveError> {
        let params = self.metadata_params(point);
        let response = session
            .limited_get(&self.config.metadata_url, &params)
            .await?;

        let resolved = interpret_metadata(point, response.status, &response.body);
        debug!(
            lat = point.lat(),
            lon = point.lon(),
            status = resolved.ledger_status(),
            "Resolved point"
        );
        Ok(resolved)
    }
}
