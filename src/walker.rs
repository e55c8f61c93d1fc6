//! Directory enumeration

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Lazy walk item. An `Err` aborts the scan session.
pub type WalkItem = Result<PathBuf, ScanError>;

/// Produces absolute file paths under a root, in no particular order
pub trait DirectoryWalker: Send + Sync {
    fn walk<'a>(&'a self, root: &'a Path) -> Box<dyn Iterator<Item = WalkItem> + 'a>;
}

/// Recursive walker backed by `walkdir`
#[derive(Debug, Clone)]
pub struct WalkdirWalker {
    config: ScanConfig,
}

impl WalkdirWalker {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }
}

impl DirectoryWalker for WalkdirWalker {
    fn walk<'a>(&'a self, root: &'a Path) -> Box<dyn Iterator<Item = WalkItem> + 'a> {
        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_links)
            .into_iter()
            .filter_entry(move |entry| {
                // Never filter the root, even if its name looks hidden
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !self.config.should_ignore_dir(name))
                    .unwrap_or(true)
            });

        Box::new(walker.filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) if e.depth() == 0 => Some(Err(ScanError::enumeration(
                root.to_path_buf(),
                format!("Cannot read library root: {}", e),
            ))),
            Err(e) => {
                log::warn!("Skipping unreadable entry {:?}: {}", e.path(), e);
                None
            }
        }))
    }
}
