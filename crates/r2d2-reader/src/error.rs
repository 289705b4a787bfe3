//! Error types for run reading and reconstruction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading run metadata or reading run products.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// A mandatory metadata file is absent.
    #[error("missing metadata file: {}", .0.display())]
    MissingFile(PathBuf),

    /// A metadata file exists but could not be parsed.
    #[error("malformed metadata in {}: {message}", path.display())]
    MalformedMetadata { path: PathBuf, message: String },

    /// A parameter the reader depends on is absent from `params.dac`.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A parameter is present but has the wrong type tag.
    #[error("parameter '{key}' is not of type {expected}")]
    ParameterType { key: String, expected: &'static str },

    /// The decomposition tables do not tile the global domain.
    #[error("decomposition does not tile the domain: {0}")]
    DecompositionMismatch(String),

    /// The requested variable is not in the catalogue of the product.
    #[error("unknown variable '{name}', expected one of {expected:?}")]
    UnknownVariable { name: String, expected: Vec<String> },

    /// The requested region does not fit the grid.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// An EOS lookup fell outside the table axes.
    #[error("EOS lookup out of range: {axis} = {value} not in [{min}, {max}]")]
    EosOutOfRange {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// An optional product needed by the operation is not present on disk.
    #[error("{0} is not available for this run")]
    CapabilityUnavailable(&'static str),

    /// A fragment or product file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    FragmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A binary record is shorter than its layout requires.
    #[error("{} is truncated: expected {expected} bytes, found {found}", path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    /// A zarr store could not be created, written or read.
    #[error("zarr store {}: {message}", path.display())]
    Zarr { path: PathBuf, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Create a MalformedMetadata error.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Zarr error.
    pub fn zarr(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Zarr {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an UnknownVariable error.
    pub fn unknown_variable<S: AsRef<str>>(name: impl Into<String>, expected: &[S]) -> Self {
        Self::UnknownVariable {
            name: name.into(),
            expected: expected.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Create an InvalidRegion error.
    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    /// Wrap an I/O error raised while reading `path`.
    ///
    /// A missing file becomes [`ReaderError::MissingFile`].
    pub fn read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingFile(path)
        } else {
            Self::FragmentRead { path, source }
        }
    }

    /// Whether the error reports a request the caller can correct.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariable { .. } | Self::InvalidRegion(_) | Self::EosOutOfRange { .. }
        )
    }
}

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;
