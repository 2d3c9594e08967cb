//! CLI command implementations

pub mod area;
pub mod error;
pub mod grid;
pub mod survey;

pub use area::AreaArgs;
pub use error::CliError;
pub use grid::GridArgs;
pub use survey::{Cli, Commands, OutputFormat, SurveyArgs};
