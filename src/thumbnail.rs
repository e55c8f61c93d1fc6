//! Thumbnail and media probing contracts

use std::path::Path;

use crate::error::ScanError;
use crate::models::{MediaId, MediaKind};

/// Renders and tracks thumbnails per media id
pub trait ThumbnailService: Send + Sync {
    /// Render a thumbnail. Failures are non-fatal to the caller.
    fn generate(&self, path: &Path, id: MediaId, kind: MediaKind) -> Result<(), ScanError>;

    fn exists(&self, id: MediaId) -> bool;
}

/// Reads media properties that require decoding
pub trait MediaProbe: Send + Sync {
    /// Duration of a video in seconds
    fn video_duration(&self, path: &Path) -> Result<Option<f64>, ScanError>;
}

/// Thumbnail service for catalogs that do not keep thumbnails
///
/// Reports every thumbnail as present so records never look stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

impl ThumbnailService for NoThumbnails {
    fn generate(&self, _path: &Path, _id: MediaId, _kind: MediaKind) -> Result<(), ScanError> {
        Ok(())
    }

    fn exists(&self, _id: MediaId) -> bool {
        true
    }
}

/// Probe that never learns a duration
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl MediaProbe for NoProbe {
    fn video_duration(&self, _path: &Path) -> Result<Option<f64>, ScanError> {
        Ok(None)
    }
}
