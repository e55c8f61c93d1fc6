//! Error types for the media catalog

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while scanning or reconciling the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// The path does not have an image or video extension
    UnsupportedFileType,
    /// Stat or read failure, usually a file that vanished mid-scan
    FileAccess,
    /// Thumbnail or duration probe failed
    ThumbnailGeneration,
    /// A full scan is already running on this orchestrator
    ScanInProgress,
    /// The library root could not be enumerated
    Enumeration,
    /// Catalog storage operation failed
    Database,
    /// Path is outside the library root or not valid UTF-8
    InvalidPath,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create an unsupported file type error
    pub fn unsupported(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::UnsupportedFileType,
            Some(path.clone()),
            format!("Unsupported file type: {:?}", path),
        )
    }

    /// Create a file access error
    pub fn file_access(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::FileAccess, Some(path), message)
    }

    /// Create a thumbnail generation error
    pub fn thumbnail(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::ThumbnailGeneration, Some(path), message)
    }

    /// Create the error returned when a second scan is requested
    pub fn scan_in_progress() -> Self {
        Self::new(
            ScanErrorKind::ScanInProgress,
            None,
            "A library scan is already in progress",
        )
    }

    /// Create an enumeration error
    pub fn enumeration(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Enumeration, Some(path), message)
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Database, None, message)
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidPath, Some(path), message)
    }

    /// Attach a path if the error does not carry one yet
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ScanErrorKind::FileAccess, None, err.to_string())
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        Self::database_error(err.to_string())
    }
}
