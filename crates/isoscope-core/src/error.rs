//! Image reader error types

use thiserror::Error;

/// The main error type for image reading operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error: short or failed read, unreadable source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or corrupted on-disk structure
    #[error("Invalid image format: {0}")]
    Format(String),

    /// A path segment does not exist
    #[error("Not found: {segment} (while resolving {path})")]
    NotFound {
        /// The full path being resolved
        path: String,
        /// The first segment that could not be found
        segment: String,
    },

    /// A path names a file where a directory was required
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A path names a directory where a file was required
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Invalid path or file name
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Unsupported format or feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Broad classification of an [`Error`], for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    NotFound,
    NotADirectory,
    IsADirectory,
    InvalidPath,
    Unsupported,
}

/// Result type alias for image reading operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// Create a not found error for `segment` of `path`
    pub fn not_found(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Error::NotFound {
            path: path.into(),
            segment: segment.into(),
        }
    }

    /// Create a not-a-directory error
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Error::NotADirectory(path.into())
    }

    /// Create an is-a-directory error
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Error::IsADirectory(path.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Error::InvalidPath(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an I/O error for a read that ran past the end of the image
    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            msg.into(),
        ))
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Format(_) => ErrorKind::Format,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::NotADirectory(_) => ErrorKind::NotADirectory,
            Error::IsADirectory(_) => ErrorKind::IsADirectory,
            Error::InvalidPath(_) => ErrorKind::InvalidPath,
            Error::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
