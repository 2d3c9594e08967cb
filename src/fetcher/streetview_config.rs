//! Street View API endpoints and credentials

use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// Name of the optional environment file.
pub const DOTENV_FILE_NAME: &str = ".env";

/// Static image endpoint.
pub const STREET_VIEW_IMAGE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Metadata endpoint; free of charge and used to snap points to panoramas.
pub const STREET_VIEW_METADATA_URL: &str =
    "https://maps.googleapis.com/maps/api/streetview/metadata";

/// Street View configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No API key was supplied
    #[error("missing API key: pass --api-key or set {API_KEY_ENV}")]
    MissingApiKey,

    /// An environment file exists but could not be loaded
    #[error("failed to load {path}: {message}")]
    DotEnv {
        /// File that failed
        path: String,
        /// Parser or IO error
        message: String,
    },
}

/// Where `.env` is looked for: beside the executable, then the working directory.
pub fn dotenv_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
    {
        candidates.push(dir.join(DOTENV_FILE_NAME));
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir.join(DOTENV_FILE_NAME));
    }
    candidates
}

/// Load the first existing file among [`dotenv_candidates`].
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    load_dotenv_from(&dotenv_candidates())
}

/// Load the first of `candidates` that exists, returning its path.
///
/// Variables already present in the environment are left untouched.
pub fn load_dotenv_from(candidates: &[PathBuf]) -> Result<Option<PathBuf>, ConfigError> {
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        return Ok(None);
    };
    dotenvy::from_path(path).map_err(|e| ConfigError::DotEnv {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!("Loaded environment from {}", path.display());
    Ok(Some(path.clone()))
}

/// Credentials and endpoint URLs for one survey.
#[derive(Clone, PartialEq, Eq)]
pub struct StreetViewConfig {
    api_key: String,
    /// Image endpoint URL
    pub image_url: String,
    /// Metadata endpoint URL
    pub metadata_url: String,
}

impl std::fmt::Debug for StreetViewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreetViewConfig")
            .field("api_key", &"<redacted>")
            .field("image_url", &self.image_url)
            .field("metadata_url", &self.metadata_url)
            .finish()
    }
}

impl StreetViewConfig {
    /// Config for the public endpoints. A blank key is rejected.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            image_url: STREET_VIEW_IMAGE_URL.to_string(),
            metadata_url: STREET_VIEW_METADATA_URL.to_string(),
        })
    }

    /// Read the key from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the key through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV).ok_or(ConfigError::MissingApiKey)?;
        Self::new(api_key)
    }

    /// Point both endpoints at a different host, e.g. a proxy or a test server.
    pub fn with_endpoints(mut self, image_url: impl Into<String>, metadata_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self.metadata_url = metadata_url.into();
        self
    }

    /// API key sent as the `key` query parameter
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}
