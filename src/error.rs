//! Error taxonomy for archive access, image output and configuration.

use std::path::PathBuf;

/// Errors raised below the pipeline layer.
///
/// The pipeline wraps these in `anyhow::Error` with the run name attached,
/// so a failure can be traced back to the run that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Missing archive path, run, mask or array.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed attribute or array content.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Failure creating a directory or writing a file.
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure encoding or writing an image file.
    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Invalid percentile, padding or worker settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ExtractError {
    pub(crate) fn decode(context: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{}: {}", context, cause))
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
