use csv_loader::LoadError;
use domain::CoreError;

use crate::config::ConfigError;

/// Everything that makes a command exit with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A book or user the command refers to does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The catalog refused the operation (book already out, no open loan).
    #[error("{0}")]
    Rejected(String),
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}
