//! Configuration for the catalog scanner

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Default catalog database file name
pub const DEFAULT_DB_FILE: &str = "media_catalog.db";

/// Default minimum interval between progress lines on stderr
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// Configuration for a library scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory under which all cataloged media lives
    pub library_root: PathBuf,

    /// Directory names to skip during enumeration
    pub ignore_dirs: HashSet<String>,

    /// Whether the walker follows symbolic links
    pub follow_links: bool,

    /// Threads for the orphan cleanup pass, 0 means auto-detect
    pub num_threads: usize,

    /// Rename files with uppercase extensions before processing
    pub normalize_extensions: bool,

    /// Catalog database path
    pub db_path: Option<PathBuf>,

    /// Whether to print progress lines to stderr
    pub show_progress: bool,

    /// Minimum interval between progress lines in milliseconds
    pub progress_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            library_root: PathBuf::new(),
            ignore_dirs: Self::default_ignore_dirs(),
            follow_links: false,
            num_threads: 0,
            normalize_extensions: true,
            db_path: None,
            show_progress: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl ScanConfig {
    /// Create a new config for the given library root
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            ".Trash",
            ".Trash-1000",
            "@eaDir",
            ".git",
            ".svn",
            "node_modules",
            "__pycache__",
            ".cache",
            ".thumbnails",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Check if a directory should be ignored
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        // Hidden directories
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Get the effective number of threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }

    /// Catalog path, defaulting to a file inside the working directory
    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the library root
    pub fn library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.library_root = root.into();
        self
    }

    /// Set the directories to ignore
    pub fn ignore_dirs(mut self, dirs: HashSet<String>) -> Self {
        self.config.ignore_dirs = dirs;
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Follow symbolic links while walking
    pub fn follow_links(mut self, enabled: bool) -> Self {
        self.config.follow_links = enabled;
        self
    }

    /// Set the number of cleanup threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Enable or disable extension normalization
    pub fn normalize_extensions(mut self, enabled: bool) -> Self {
        self.config.normalize_extensions = enabled;
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = Some(path.into());
        self
    }

    /// Enable or disable progress output
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    /// Set the progress output interval
    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
