//! Grid subcommand: print sampled points without touching the network

use clap::Parser;
use std::io::Write;

use super::survey::OutputFormat;
use super::{AreaArgs, CliError};
use crate::{format_coordinate, Point};

/// Grid command arguments
#[derive(Parser, Debug)]
pub struct GridArgs {
    /// Area to sample
    #[command(flatten)]
    pub area: AreaArgs,
}

impl GridArgs {
    /// Print the points as headerless `lat,lon` CSV, or a JSON array with `--output-format json`.
    pub fn execute(&self, output_format: OutputFormat) -> Result<(), CliError> {
        let points = self.area.load_points()?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        write_points(&mut out, &points, output_format)?;
        out.flush()
            .map_err(|e| CliError::OutputError(format!("Failed to flush stdout: {e}")))
    }
}

/// Render points in the requested format.
pub fn write_points<W: Write>(
    out: W,
    points: &[Point],
    output_format: OutputFormat,
) -> Result<(), CliError> {
    match output_format {
        OutputFormat::Json => {
            serde_json::to_writer(out, points)
                .map_err(|e| CliError::OutputError(format!("Failed to write JSON: {e}")))?;
        }
        OutputFormat::Human => {
            // No header row, so the output feeds straight back into --points-file
            let mut writer = csv::Writer::from_writer(out);
            for point in points {
                writer
                    .write_record([format_coordinate(point.lat()), format_coordinate(point.lon())])
                    .map_err(|e| CliError::OutputError(format!("Failed to write CSV: {e}")))?;
            }
            writer
                .flush()
                .map_err(|e| CliError::OutputError(format!("Failed to write CSV: {e}")))?;
        }
    }
    Ok(())
}
