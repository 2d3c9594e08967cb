//! Survey command implementation

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

use super::{AreaArgs, CliError, GridArgs};
use crate::downloader::config::{
    DEFAULT_FOV, DEFAULT_HEADINGS, DEFAULT_MAX_PER_MINUTE, DEFAULT_MAX_RETRIES, DEFAULT_PITCH,
    DEFAULT_SIZE, DEFAULT_TIMEOUT_SECS,
};
use crate::downloader::survey::{SurveyOptions, SurveyOrchestrator, SurveySummary};
use crate::downloader::SurveyError;
use crate::fetcher::streetview_config::{StreetViewConfig, API_KEY_ENV};
use crate::shutdown::SharedShutdown;

/// Street View survey CLI
#[derive(Parser, Debug)]
#[command(name = "streetview-survey")]
#[command(about = "Grid-sample an area and download Street View imagery", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download imagery for every point in an area
    Survey(SurveyArgs),

    /// Print the sampled points without making any request
    Grid(GridArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Survey command arguments
#[derive(Parser, Debug)]
pub struct SurveyArgs {
    /// Street View API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory receiving images and downloads.csv
    #[arg(long, default_value = "survey_output")]
    pub output_dir: PathBuf,

    /// Survey area
    #[command(flatten)]
    pub area: AreaArgs,

    /// Camera headings in degrees, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_HEADINGS.to_vec())]
    pub headings: Vec<u16>,

    /// Image size in pixels
    #[arg(long, num_args = 2, value_names = ["W", "H"], default_values_t = [DEFAULT_SIZE.0, DEFAULT_SIZE.1])]
    pub size: Vec<u32>,

    /// Field of view in degrees
    #[arg(long, default_value_t = DEFAULT_FOV)]
    pub fov: u16,

    /// Camera pitch in degrees
    #[arg(long, default_value_t = DEFAULT_PITCH, allow_negative_numbers = true)]
    pub pitch: i16,

    /// Request images by raw coordinate, skipping the metadata lookup
    #[arg(long, default_value_t = false)]
    pub no_metadata: bool,

    /// Outbound requests allowed per trailing minute
    #[arg(long, default_value_t = DEFAULT_MAX_PER_MINUTE)]
    pub max_per_minute: usize,

    /// Stop after this many image requests
    #[arg(long)]
    pub max_requests: Option<u64>,

    /// Retries for network failures and 5xx responses
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Skip images the existing ledger already lists as saved
    #[arg(long, default_value_t = false)]
    pub skip_completed: bool,
}

impl SurveyArgs {
    /// Survey options described by these arguments.
    pub fn survey_options(&self) -> Result<SurveyOptions, CliError> {
        let [width, height] = self.size.as_slice() else {
            return Err(CliError::InvalidArgument(format!(
                "--size takes 2 values, got {}",
                self.size.len()
            )));
        };

        let options = SurveyOptions::default()
            .with_headings(self.headings.clone())
            .with_size(*width, *height)
            .with_fov(self.fov)
            .with_pitch(self.pitch)
            .with_metadata(!self.no_metadata)
            .with_max_per_minute(self.max_per_minute)
            .with_max_requests(self.max_requests)
            .with_max_retries(self.max_retries)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_skip_completed(self.skip_completed);
        options.validate()?;
        Ok(options)
    }

    /// Execute the survey
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        // Key first: a missing key must fail before any file or network activity
        let config = StreetViewConfig::new(self.api_key.clone().unwrap_or_default())?;
        let options = self.survey_options()?;
        let points = self.area.load_points()?;

        let mut orchestrator =
            SurveyOrchestrator::new(config, options)?.with_shutdown(shutdown);
        if cli.output_format == OutputFormat::Human {
            orchestrator = orchestrator.with_progress(create_progress_bar(points.len()));
        }

        info!(
            points = points.len(),
            output_dir = %self.output_dir.display(),
            "Starting survey"
        );
        let result = orchestrator.run(&points, &self.output_dir).await;

        match cli.output_format {
            OutputFormat::Json => output_json(&self.output_dir, &result)?,
            OutputFormat::Human => output_human(&self.output_dir, &result),
        }

        result.map(|_| ()).map_err(CliError::SurveyError)
    }
}

/// Output result as JSON
fn output_json(
    output_dir: &std::path::Path,
    result: &Result<SurveySummary, SurveyError>,
) -> Result<(), CliError> {
    let output = match result {
        Ok(summary) => serde_json::json!({
            "success": true,
            "output_dir": output_dir.display().to_string(),
            "summary": summary,
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "output_dir": output_dir.display().to_string(),
            "summary": null,
            "error": e.to_string(),
        }),
    };
    let rendered = serde_json::to_string(&output)
        .map_err(|e| CliError::OutputError(format!("Failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Output result in human-readable format
fn output_human(output_dir: &std::path::Path, result: &Result<SurveySummary, SurveyError>) {
    match result {
        Ok(summary) => {
            if summary.cancelled {
                println!("\nSurvey interrupted.");
            } else if summary.budget_exhausted {
                println!("\nSurvey stopped: request budget exhausted.");
            } else {
                println!("\nSurvey completed successfully!");
            }
            println!("Output: {}", output_dir.display());
            println!(
                "Points processed: {}/{}",
                summary.points_processed, summary.points_total
            );
            println!("Points without coverage: {}", summary.points_skipped);
            println!("Images saved: {}", summary.images_saved);
            if summary.images_failed > 0 {
                println!("Images failed: {}", summary.images_failed);
            }
            if summary.images_already_completed > 0 {
                println!(
                    "Images already in ledger: {}",
                    summary.images_already_completed
                );
            }
            println!("Image requests: {}", summary.requests_issued);
        }
        Err(e) => {
            eprintln!("\nSurvey failed!");
            error!("Survey failed: {}", e);
        }
    }
}

/// Create progress bar over points
fn create_progress_bar(total_points: usize) -> ProgressBar {
    let pb = ProgressBar::new(total_points as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} points ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
