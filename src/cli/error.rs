//! CLI error types and conversions

use crate::downloader::SurveyError;
use crate::fetcher::streetview_config::ConfigError;
use crate::grid::{GridError, PointsFileError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Survey error
    #[error("survey error: {0}")]
    SurveyError(#[from] SurveyError),

    /// Grid error
    #[error("grid error: {0}")]
    GridError(#[from] GridError),

    /// Points file error
    #[error("points file error: {0}")]
    PointsFileError(#[from] PointsFileError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing to stdout failed
    #[error("output error: {0}")]
    OutputError(String),
}
