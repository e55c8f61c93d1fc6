//! Scan orchestration: single-flight library scans and single-file rescans
//!
//! A full scan runs on a background thread in two phases. The walker is
//! drained into a stable list of supported files first; the list is then
//! processed strictly in order, one file at a time, so rename matching and
//! progress ordering are deterministic. Records that were not touched and
//! whose file no longer resolves are removed afterwards.

use rayon::prelude::*;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::classifier::{classify, require_kind, resolve};
use crate::config::ScanConfig;
use crate::detector::{CandidatePool, ChangeDetector};
use crate::error::{ScanError, ScanErrorKind};
use crate::models::{FileScanOutcome, MediaId, MediaRecord, ScanProgress, ScanState, ScanSummary};
use crate::normalizer::{ExtensionNormalizer, KeepExtensions, LowercaseExtensions};
use crate::progress::{NullSink, ScanSink};
use crate::repository::CatalogRepository;
use crate::thumbnail::{MediaProbe, NoProbe, NoThumbnails, ThumbnailService};
use crate::walker::{DirectoryWalker, WalkdirWalker};

/// Holds the single-flight flag for the lifetime of a scan
///
/// The flag is cleared on drop, so it is released on every exit path of the
/// scan thread, including a failed spawn.
struct ScanGuard {
    flag: Arc<AtomicBool>,
}

impl ScanGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ScanError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::scan_in_progress())?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to a running scan session
///
/// Results are delivered through the orchestrator's sink. The handle only
/// lets the caller wait for the background thread.
#[derive(Debug)]
pub struct ScanHandle {
    summary: ScanSummary,
    thread: JoinHandle<Result<ScanSummary, ScanError>>,
}

impl ScanHandle {
    /// Placeholder summary returned at start, always zeroed
    pub fn summary(&self) -> ScanSummary {
        self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the session ends, returning what the completion sink received
    pub fn wait(self) -> Result<ScanSummary, ScanError> {
        self.thread.join().unwrap_or_else(|_| {
            Err(ScanError::new(
                ScanErrorKind::Unknown,
                None,
                "Scan thread panicked",
            ))
        })
    }
}

#[derive(Debug, Default)]
struct Tally {
    added: u64,
    updated: u64,
    unchanged: u64,
    failed: u64,
}

impl Tally {
    fn record(&mut self, outcome: &FileScanOutcome) {
        match outcome {
            FileScanOutcome::Added(_) => self.added += 1,
            FileScanOutcome::Updated(_) => self.updated += 1,
            FileScanOutcome::Unchanged(_) => self.unchanged += 1,
            FileScanOutcome::Failed(_) => self.failed += 1,
        }
    }
}

struct ScanContext {
    config: ScanConfig,
    repository: Arc<dyn CatalogRepository>,
    detector: ChangeDetector,
    walker: Arc<dyn DirectoryWalker>,
    normalizer: Arc<dyn ExtensionNormalizer>,
    sink: Arc<dyn ScanSink>,
}

impl ScanContext {
    fn run(&self, library_root: &Path) -> Result<ScanSummary, ScanError> {
        log::info!("Starting library scan of {:?}", library_root);

        let files = self.enumerate(library_root)?;
        let total = files.len() as u64;
        log::info!("Found {} supported media files", total);
        self.sink.on_start(library_root, total);

        let snapshot = self.repository.list_all()?;
        let mut pool = CandidatePool::from_records(&snapshot);
        let mut touched: HashSet<MediaId> = HashSet::with_capacity(files.len());
        let mut tally = Tally::default();

        for (index, path) in files.iter().enumerate() {
            let path = self.normalize(path);

            match self.detector.detect(&path, library_root, Some(&mut pool)) {
                Ok(outcome) => {
                    if let Some(record) = outcome.record() {
                        touched.insert(record.id);
                        pool.retire(record.id);
                    }
                    if let FileScanOutcome::Failed(e) = &outcome {
                        log::warn!("Failed to process {:?}: {}", path, e);
                    }
                    tally.record(&outcome);
                }
                Err(e) => {
                    log::warn!("Skipping {:?}: {}", path, e);
                    tally.failed += 1;
                }
            }

            self.sink.on_progress(&ScanProgress {
                current: index as u64 + 1,
                total,
            });
        }

        let removed = self.remove_orphans(library_root, &snapshot, &touched)?;

        let summary = ScanSummary {
            added: tally.added,
            updated: tally.updated,
            removed,
            total: (snapshot.len() as u64)
                .saturating_sub(removed)
                .saturating_add(tally.added),
        };
        log::info!(
            "Library scan finished: {} added, {} updated, {} unchanged, {} failed, {} removed, {} total",
            summary.added,
            summary.updated,
            tally.unchanged,
            tally.failed,
            summary.removed,
            summary.total
        );
        Ok(summary)
    }

    /// Drain the walker into a stable list of supported files
    fn enumerate(&self, library_root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();
        for item in self.walker.walk(library_root) {
            let path = item?;
            if classify(&path).supported {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        match self.normalizer.repair(path) {
            Ok(repaired) => repaired,
            Err(e) => {
                log::warn!("Could not normalize extension of {:?}: {}", path, e);
                path.to_path_buf()
            }
        }
    }

    /// Delete untouched records whose file cannot be resolved
    ///
    /// Legacy records without a relative path are never deleted.
    fn remove_orphans(
        &self,
        library_root: &Path,
        snapshot: &[MediaRecord],
        touched: &HashSet<MediaId>,
    ) -> Result<u64, ScanError> {
        let candidates: Vec<&MediaRecord> = snapshot
            .iter()
            .filter(|r| !touched.contains(&r.id) && !r.is_legacy())
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .thread_name(|i| format!("media-catalog-cleanup-{}", i))
            .build()
            .map_err(|e| ScanError::new(ScanErrorKind::Unknown, None, e.to_string()))?;

        let orphans: Vec<&MediaRecord> = threads.install(|| {
            candidates
                .par_iter()
                .filter(|r| !resolve(library_root, &r.relative_path).exists())
                .copied()
                .collect()
        });

        let mut removed = 0;
        for record in orphans {
            match self.repository.delete(record.id) {
                Ok(()) => {
                    log::debug!("Removed orphan media {} ({})", record.id, record.relative_path);
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove orphan media {}: {}", record.id, e),
            }
        }
        Ok(removed)
    }
}

/// Runs library scans against a catalog, at most one at a time
///
/// Construct one per catalog at the application's composition root and
/// share it; the single-flight rule is owned by the instance.
pub struct ScanOrchestrator {
    ctx: Arc<ScanContext>,
    scanning: Arc<AtomicBool>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("library_root", &self.ctx.config.library_root)
            .field("state", &self.state())
            .finish()
    }
}

impl ScanOrchestrator {
    /// Create a builder with default collaborators for `repository`
    pub fn builder(repository: Arc<dyn CatalogRepository>) -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new(repository)
    }

    /// Start a full scan of `library_root` on a background thread
    ///
    /// Fails immediately with [`ScanErrorKind::ScanInProgress`] while another
    /// scan runs. Otherwise returns at once; progress and the final summary
    /// go to the sink.
    pub fn start_scan(&self, library_root: impl Into<PathBuf>) -> Result<ScanHandle, ScanError> {
        let guard = ScanGuard::acquire(&self.scanning)?;
        let ctx = Arc::clone(&self.ctx);
        let library_root = library_root.into();

        let thread = thread::Builder::new()
            .name("media-catalog-scan".into())
            .spawn(move || {
                let _guard = guard;
                let result = panic::catch_unwind(AssertUnwindSafe(|| ctx.run(&library_root)))
                    .unwrap_or_else(|payload| {
                        Err(ScanError::new(
                            ScanErrorKind::Unknown,
                            Some(library_root.clone()),
                            format!("Scan aborted by panic: {}", panic_message(payload.as_ref())),
                        ))
                    });
                if let Err(e) = &result {
                    log::error!("Library scan of {:?} failed: {}", library_root, e);
                }
                ctx.sink.on_complete(&result);
                result
            })
            .map_err(|e| {
                ScanError::new(
                    ScanErrorKind::Unknown,
                    None,
                    format!("Failed to spawn scan thread: {}", e),
                )
            })?;

        Ok(ScanHandle {
            summary: ScanSummary::default(),
            thread,
        })
    }

    /// Reconcile a single file with the catalog, outside of a full scan
    ///
    /// Fails for unsupported file types, paths outside the configured
    /// library root, and when no library root is configured.
    pub fn scan_file(&self, path: impl AsRef<Path>) -> Result<FileScanOutcome, ScanError> {
        let path = path.as_ref();
        if self.ctx.config.library_root.as_os_str().is_empty() {
            return Err(ScanError::invalid_path(
                path.to_path_buf(),
                "No library root configured",
            ));
        }
        require_kind(path)?;

        let path = self.ctx.normalize(path);
        let outcome = self
            .ctx
            .detector
            .detect(&path, &self.ctx.config.library_root, None)?;
        log::debug!("Rescanned {:?}: {}", path, outcome.as_str());
        Ok(outcome)
    }

    pub fn state(&self) -> ScanState {
        if self.is_scanning() {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.ctx.config
    }
}

/// Builder for [`ScanOrchestrator`]
pub struct ScanOrchestratorBuilder {
    config: ScanConfig,
    repository: Arc<dyn CatalogRepository>,
    thumbnails: Arc<dyn ThumbnailService>,
    probe: Arc<dyn MediaProbe>,
    walker: Option<Arc<dyn DirectoryWalker>>,
    normalizer: Option<Arc<dyn ExtensionNormalizer>>,
    sink: Arc<dyn ScanSink>,
}

impl ScanOrchestratorBuilder {
    pub fn new(repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            config: ScanConfig::default(),
            repository,
            thumbnails: Arc::new(NoThumbnails),
            probe: Arc::new(NoProbe),
            walker: None,
            normalizer: None,
            sink: Arc::new(NullSink),
        }
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn thumbnails(mut self, thumbnails: Arc<dyn ThumbnailService>) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn walker(mut self, walker: Arc<dyn DirectoryWalker>) -> Self {
        self.walker = Some(walker);
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn ExtensionNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ScanSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> ScanOrchestrator {
        let walker: Arc<dyn DirectoryWalker> = match self.walker {
            Some(walker) => walker,
            None => Arc::new(WalkdirWalker::new(self.config.clone())),
        };
        let normalizer: Arc<dyn ExtensionNormalizer> = match self.normalizer {
            Some(normalizer) => normalizer,
            None if self.config.normalize_extensions => Arc::new(LowercaseExtensions),
            None => Arc::new(KeepExtensions),
        };
        let detector = ChangeDetector::new(Arc::clone(&self.repository), self.thumbnails, self.probe);

        ScanOrchestrator {
            ctx: Arc::new(ScanContext {
                config: self.config,
                repository: self.repository,
                detector,
                walker,
                normalizer,
                sink: self.sink,
            }),
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }
}
