//! Media library catalog kept in sync with a directory tree
//!
//! This library scans a library root for images and videos and reconciles
//! what it finds with a persistent catalog: new files are added, edited and
//! moved files update their existing record, and records whose file is gone
//! are removed. At most one full scan runs per [`ScanOrchestrator`].

pub mod classifier;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod progress;
pub mod repository;
pub mod thumbnail;
pub mod walker;

#[cfg(test)]
mod testing;

pub use classifier::{classify, Classification};
pub use config::ScanConfig;
pub use db::SqliteCatalog;
pub use detector::{CandidatePool, ChangeDetector};
pub use error::{ScanError, ScanErrorKind};
pub use models::{
    FileScanOutcome, FileStats, MediaId, MediaKind, MediaPatch, MediaRecord, NewMediaRecord,
    ScanProgress, ScanState, ScanSummary,
};
pub use normalizer::{ExtensionNormalizer, KeepExtensions, LowercaseExtensions};
pub use orchestrator::{ScanHandle, ScanOrchestrator, ScanOrchestratorBuilder};
pub use progress::{ChannelSink, FanoutSink, NullSink, ProgressReporter, ScanEvent, ScanSink};
pub use repository::{CatalogRepository, MemoryCatalog};
pub use thumbnail::{MediaProbe, NoProbe, NoThumbnails, ThumbnailService};
pub use walker::{DirectoryWalker, WalkdirWalker};
