//! Error types for the regrid crate.

use std::path::PathBuf;

use r2d2_reader::ReaderError;
use thiserror::Error;

/// Errors that can occur while regridding a run.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Reading the source run failed.
    #[error("failed to read source run: {0}")]
    Source(#[from] ReaderError),

    #[error("destination {} already exists", .0.display())]
    DestinationExists(PathBuf),

    #[error("destination {} is the source run directory", .0.display())]
    SameDirectory(PathBuf),

    /// Copying the source run would walk into the destination.
    #[error("destination {} lies inside the source run directory", .0.display())]
    InsideSource(PathBuf),

    /// The target grid cannot be generated as requested.
    #[error("invalid grid specification: {0}")]
    InvalidGridSpec(String),

    #[error("regridding is not supported for {0} runs")]
    UnsupportedGeometry(String),

    /// The request file could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to copy run skeleton: {0}")]
    Skeleton(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegridError {
    /// Create an InvalidGridSpec error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGridSpec(msg.into())
    }

    /// Wrap an I/O error raised while working on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether nothing was written because the destination was rejected.
    pub fn is_destination_conflict(&self) -> bool {
        matches!(
            self,
            Self::DestinationExists(_) | Self::SameDirectory(_) | Self::InsideSource(_)
        )
    }
}

/// Result type for regrid operations.
pub type Result<T> = std::result::Result<T, RegridError>;
