//! Survey area arguments shared by `survey` and `grid`

use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use super::CliError;
use crate::downloader::config::DEFAULT_GRID_STEP;
use crate::grid::{self, parse_points_file};
use crate::{BoundingBox, Point};

/// Where the points come from: a points file or a sampled bounding box.
#[derive(Args, Debug, Clone)]
pub struct AreaArgs {
    /// CSV (`lat,lon` rows) or JSON array of points to survey
    #[arg(long, conflicts_with = "bbox", required_unless_present = "bbox")]
    pub points_file: Option<PathBuf>,

    /// Bounding box to sample
    #[arg(
        long,
        num_args = 4,
        value_names = ["LAT_MIN", "LAT_MAX", "LON_MIN", "LON_MAX"],
        allow_negative_numbers = true
    )]
    pub bbox: Option<Vec<f64>>,

    /// Grid spacing in degrees (bounding box only)
    #[arg(long, default_value_t = DEFAULT_GRID_STEP)]
    pub grid_step: f64,
}

impl AreaArgs {
    /// Bounding box with swapped bounds put back in order.
    pub fn bounding_box(&self) -> Result<Option<BoundingBox>, CliError> {
        let Some(values) = &self.bbox else {
            return Ok(None);
        };
        let [lat_min, lat_max, lon_min, lon_max] = values.as_slice() else {
            return Err(CliError::InvalidArgument(format!(
                "--bbox takes 4 values, got {}",
                values.len()
            )));
        };

        let bbox = BoundingBox::new(*lat_min, *lat_max, *lon_min, *lon_max);
        if !bbox.is_ordered() {
            warn!("Bounding box bounds were swapped; normalizing");
        }
        Ok(Some(bbox.normalized()))
    }

    /// Points to survey, in processing order.
    pub fn load_points(&self) -> Result<Vec<Point>, CliError> {
        if let Some(path) = &self.points_file {
            let points = parse_points_file(path)?;
            info!(points = points.len(), "Loaded points from {}", path.display());
            return Ok(points);
        }

        match self.bounding_box()? {
            Some(bbox) => Ok(grid::generate(&bbox, self.grid_step)?),
            None => Err(CliError::InvalidArgument(
                "one of --points-file or --bbox is required".to_string(),
            )),
        }
    }
}
