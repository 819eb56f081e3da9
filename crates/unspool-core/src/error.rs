//! Error types for extraction operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Errors that can occur while detecting, unpacking or disposing of an input.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Content did not match any supported format.
    #[error("unsupported format: {path}")]
    UnsupportedFormat {
        /// The rejected input.
        path: PathBuf,
    },

    /// Container is corrupted or could not be parsed.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// Entry path would escape the destination directory.
    #[error("unsafe entry path: {path}")]
    UnsafePath {
        /// The raw path recorded in the container.
        path: PathBuf,
    },

    /// External unpack routine failed.
    #[error("{tool} failed: {reason}")]
    Delegate {
        /// Name of the delegated unpacker.
        tool: String,
        /// Failure description reported by the unpacker.
        reason: String,
    },
}

impl ExtractionError {
    /// Returns `true` if this error is a filesystem race that extraction
    /// treats as success: the target already exists, vanished, or a
    /// directory gained entries before it could be removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io;
    /// use unspool_core::ExtractionError;
    ///
    /// let err = ExtractionError::Io(io::Error::from(io::ErrorKind::NotFound));
    /// assert!(err.is_benign_race());
    ///
    /// let err = ExtractionError::InvalidArchive("bad header".into());
    /// assert!(!err.is_benign_race());
    /// ```
    #[must_use]
    pub fn is_benign_race(&self) -> bool {
        match self {
            Self::Io(err) => is_benign_io(err),
            _ => false,
        }
    }

    /// Returns a context string for this error, if available.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::InvalidArchive(msg) => Some(msg),
            Self::Delegate { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Returns `true` for I/O errors produced by concurrent create/remove races.
pub(crate) fn is_benign_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AlreadyExists | io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
    )
}

impl From<zip::result::ZipError> for ExtractionError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => Self::Io(io_err),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}

impl From<sevenz_rust2::Error> for ExtractionError {
    fn from(err: sevenz_rust2::Error) -> Self {
        Self::Delegate {
            tool: "7z".into(),
            reason: err.to_string(),
        }
    }
}
