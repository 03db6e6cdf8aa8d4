//! Errors surfaced by the driver.

use std::path::PathBuf;

use sward_batch::BatchError;
use thiserror::Error;

/// Errors that can stop a run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Any batch pipeline failure.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::AppConfig`].
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is outside its accepted range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The GPU backend was requested from a build without it.
    #[error("gpu backend requested but this build has no `gpu` feature")]
    GpuDisabled,
}

/// Result type for the driver.
pub type AppResult<T> = Result<T, AppError>;
