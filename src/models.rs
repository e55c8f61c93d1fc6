//! Core data models for the media catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScanError;

/// Media kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still images (jpg, png, webp, ...)
    Image,
    /// Video files (mp4, mkv, mov, ...)
    Video,
}

impl MediaKind {
    /// Infer media kind from a file extension, `None` when unsupported
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "avif" => Some(MediaKind::Image),
            "mp4" | "webm" | "mov" | "avi" | "mkv" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Parse the stored string representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable catalog identity of a media record, survives renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub i64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cataloged media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    /// Library-root-relative path with `/` separators. Empty for legacy rows.
    pub relative_path: String,
    pub kind: MediaKind,
    pub display_name: String,
    pub size_bytes: u64,
    /// Creation time as Unix seconds
    pub created_at: i64,
    /// Modification time as Unix seconds
    pub modified_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub indexed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Whether the record predates relative path tracking
    pub fn is_legacy(&self) -> bool {
        self.relative_path.is_empty()
    }
}

/// Fields for a record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaRecord {
    pub relative_path: String,
    pub kind: MediaKind,
    pub display_name: String,
    pub size_bytes: u64,
    pub created_at: i64,
    pub modified_at: i64,
    pub duration_seconds: Option<f64>,
}

/// Mutable fields written back when a known file changed
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPatch {
    pub relative_path: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub modified_at: i64,
    pub duration_seconds: Option<f64>,
}

impl MediaPatch {
    /// Apply the patch to a record, stamping `updated_at`
    pub fn apply_to(&self, record: &mut MediaRecord) {
        record.relative_path = self.relative_path.clone();
        record.display_name = self.display_name.clone();
        record.size_bytes = self.size_bytes;
        record.modified_at = self.modified_at;
        record.duration_seconds = self.duration_seconds;
        record.updated_at = Utc::now();
    }
}

/// Filesystem facts about one file, second granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub size_bytes: u64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl FileStats {
    /// Read stats from the filesystem
    ///
    /// Creation time falls back to the modification time on platforms that
    /// cannot report it.
    pub fn read(path: &std::path::Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }

        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let created_at = metadata
            .created()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(modified_at);

        Ok(Self {
            size_bytes: metadata.len(),
            created_at,
            modified_at,
        })
    }
}

/// Result of processing a single file, never persisted
#[derive(Debug, Clone)]
pub enum FileScanOutcome {
    Added(MediaRecord),
    Updated(MediaRecord),
    Unchanged(MediaRecord),
    Failed(ScanError),
}

impl FileScanOutcome {
    /// The record the file resolved to, if processing succeeded
    pub fn record(&self) -> Option<&MediaRecord> {
        match self {
            FileScanOutcome::Added(r) | FileScanOutcome::Updated(r) | FileScanOutcome::Unchanged(r) => {
                Some(r)
            }
            FileScanOutcome::Failed(_) => None,
        }
    }

    /// Get short label for logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            FileScanOutcome::Added(_) => "added",
            FileScanOutcome::Updated(_) => "updated",
            FileScanOutcome::Unchanged(_) => "unchanged",
            FileScanOutcome::Failed(_) => "failed",
        }
    }
}

/// Aggregate counters of a finished scan session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    /// Records in the catalog after the scan
    pub total: u64,
}

/// Per-file progress snapshot during the process phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// 1-based index of the file just processed
    pub current: u64,
    /// Number of supported files enumerated
    pub total: u64,
}

impl ScanProgress {
    /// Fraction complete in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f64 / self.total as f64
    }
}

/// Scan session state of an orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
}
