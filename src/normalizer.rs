//! Extension normalization before classification

use std::path::{Path, PathBuf};

use crate::error::ScanError;

/// Repairs a file on disk before it is processed, returning its new path
pub trait ExtensionNormalizer: Send + Sync {
    fn repair(&self, path: &Path) -> Result<PathBuf, ScanError>;
}

/// Renames `IMG_0001.JPG` to `IMG_0001.jpg`
///
/// Leaves the file alone when the lowercase target already exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowercaseExtensions;

impl ExtensionNormalizer for LowercaseExtensions {
    fn repair(&self, path: &Path) -> Result<PathBuf, ScanError> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(path.to_path_buf());
        };

        let lower = ext.to_lowercase();
        if lower == ext {
            return Ok(path.to_path_buf());
        }

        let target = path.with_extension(&lower);
        if target.exists() {
            log::debug!("Not renaming {:?}, {:?} already exists", path, target);
            return Ok(path.to_path_buf());
        }

        std::fs::rename(path, &target)
            .map_err(|e| ScanError::file_access(path.to_path_buf(), e.to_string()))?;
        log::info!("Renamed {:?} -> {:?}", path, target);
        Ok(target)
    }
}

/// Normalizer that leaves every path untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepExtensions;

impl ExtensionNormalizer for KeepExtensions {
    fn repair(&self, path: &Path) -> Result<PathBuf, ScanError> {
        Ok(path.to_path_buf())
    }
}
