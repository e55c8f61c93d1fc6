//! Change detection for a single file against the catalog
//!
//! A file is matched to an existing record by its library-relative path
//! first. When no record has that path, records with the same size and
//! creation time whose own path no longer resolves are treated as the
//! file's previous location (rename/move detection). Anything else is a
//! new file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::classifier::{display_name, relative_path, require_kind, resolve};
use crate::error::{ScanError, ScanErrorKind};
use crate::models::{
    FileScanOutcome, FileStats, MediaId, MediaKind, MediaPatch, MediaRecord, NewMediaRecord,
};
use crate::repository::CatalogRepository;
use crate::thumbnail::{MediaProbe, ThumbnailService};

/// Rename candidates taken from a catalog snapshot
///
/// Records leave the pool once they are bound to a file, so a single stale
/// record can be claimed by at most one file per session.
#[derive(Debug, Default)]
pub struct CandidatePool {
    by_stats: HashMap<(u64, i64), Vec<MediaRecord>>,
    keys: HashMap<MediaId, (u64, i64)>,
}

impl CandidatePool {
    /// Build from a snapshot, skipping legacy records without a relative path
    pub fn from_records(records: &[MediaRecord]) -> Self {
        let mut pool = Self::default();
        for record in records.iter().filter(|r| !r.is_legacy()) {
            let key = (record.size_bytes, record.created_at);
            pool.keys.insert(record.id, key);
            pool.by_stats.entry(key).or_default().push(record.clone());
        }
        pool
    }

    /// Records with the given size and creation time, in snapshot order
    pub fn candidates(&self, size_bytes: u64, created_at: i64) -> &[MediaRecord] {
        self.by_stats
            .get(&(size_bytes, created_at))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove a record from further consideration
    pub fn retire(&mut self, id: MediaId) {
        let Some(key) = self.keys.remove(&id) else {
            return;
        };
        if let Some(bucket) = self.by_stats.get_mut(&key) {
            bucket.retain(|r| r.id != id);
            if bucket.is_empty() {
                self.by_stats.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn is_caller_error(error: &ScanError) -> bool {
    matches!(
        error.kind,
        ScanErrorKind::UnsupportedFileType | ScanErrorKind::InvalidPath
    )
}

/// Decides whether a file is new, moved, changed or unchanged and writes the result
#[derive(Clone)]
pub struct ChangeDetector {
    repository: Arc<dyn CatalogRepository>,
    thumbnails: Arc<dyn ThumbnailService>,
    probe: Arc<dyn MediaProbe>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector").finish_non_exhaustive()
    }
}

impl ChangeDetector {
    pub fn new(
        repository: Arc<dyn CatalogRepository>,
        thumbnails: Arc<dyn ThumbnailService>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            repository,
            thumbnails,
            probe,
        }
    }

    /// Reconcile one file with the catalog
    ///
    /// Returns `Err` only for caller mistakes: an unsupported file type or a
    /// path outside `library_root`. Runtime failures such as a file that
    /// vanished or a storage error come back as [`FileScanOutcome::Failed`].
    ///
    /// With a `pool`, rename candidates come from that snapshot and matched
    /// candidates are retired. Without one, the repository is queried.
    pub fn detect(
        &self,
        path: &Path,
        library_root: &Path,
        pool: Option<&mut CandidatePool>,
    ) -> Result<FileScanOutcome, ScanError> {
        let kind = require_kind(path)?;
        let relative = relative_path(path, library_root)?;

        match self.reconcile(path, library_root, kind, &relative, pool) {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_caller_error(&e) => Err(e),
            Err(e) => Ok(FileScanOutcome::Failed(e.with_path(path))),
        }
    }

    fn reconcile(
        &self,
        path: &Path,
        library_root: &Path,
        kind: MediaKind,
        relative: &str,
        pool: Option<&mut CandidatePool>,
    ) -> Result<FileScanOutcome, ScanError> {
        let stats = FileStats::read(path)
            .map_err(|e| ScanError::file_access(path.to_path_buf(), e.to_string()))?;

        if let Some(record) = self.repository.find_by_relative_path(relative)? {
            return self.refresh(record, path, kind, relative, &stats);
        }

        if let Some(record) = self.find_moved(library_root, kind, relative, &stats, pool)? {
            log::info!(
                "Detected move of media {}: {} -> {}",
                record.id,
                record.relative_path,
                relative
            );
            return self.refresh(record, path, kind, relative, &stats);
        }

        let record = self.repository.create(NewMediaRecord {
            relative_path: relative.to_string(),
            kind,
            display_name: display_name(path),
            size_bytes: stats.size_bytes,
            created_at: stats.created_at,
            modified_at: stats.modified_at,
            duration_seconds: self.duration(path, kind, None),
        })?;
        log::debug!("Added {} as media {}", relative, record.id);

        self.generate_thumbnail(path, record.id, kind);
        Ok(FileScanOutcome::Added(record))
    }

    /// First stale record of the same kind with matching size and creation time
    fn find_moved(
        &self,
        library_root: &Path,
        kind: MediaKind,
        relative: &str,
        stats: &FileStats,
        pool: Option<&mut CandidatePool>,
    ) -> Result<Option<MediaRecord>, ScanError> {
        let is_stale = |candidate: &MediaRecord| {
            !candidate.is_legacy()
                && candidate.kind == kind
                && candidate.relative_path != relative
                && !resolve(library_root, &candidate.relative_path).exists()
        };

        match pool {
            Some(pool) => {
                let found = pool
                    .candidates(stats.size_bytes, stats.created_at)
                    .iter()
                    .find(|c| is_stale(c))
                    .cloned();
                if let Some(record) = &found {
                    pool.retire(record.id);
                }
                Ok(found)
            }
            None => Ok(self
                .repository
                .find_by_size_and_created_at(stats.size_bytes, stats.created_at)?
                .into_iter()
                .find(|c| is_stale(c))),
        }
    }

    /// Compare a matched record with the file and write back any difference
    fn refresh(
        &self,
        record: MediaRecord,
        path: &Path,
        kind: MediaKind,
        relative: &str,
        stats: &FileStats,
    ) -> Result<FileScanOutcome, ScanError> {
        let moved = record.relative_path != relative;
        let content_changed =
            record.modified_at != stats.modified_at || record.size_bytes != stats.size_bytes;
        let thumbnail_missing = !self.thumbnails.exists(record.id);

        if !moved && !content_changed && !thumbnail_missing {
            return Ok(FileScanOutcome::Unchanged(record));
        }

        let duration_seconds = if content_changed || record.duration_seconds.is_none() {
            self.duration(path, kind, record.duration_seconds)
        } else {
            record.duration_seconds
        };

        let updated = self.repository.update(
            record.id,
            MediaPatch {
                relative_path: relative.to_string(),
                display_name: display_name(path),
                size_bytes: stats.size_bytes,
                modified_at: stats.modified_at,
                duration_seconds,
            },
        )?;
        log::debug!(
            "Updated media {} (moved={}, changed={}, thumbnail_missing={})",
            updated.id,
            moved,
            content_changed,
            thumbnail_missing
        );

        self.generate_thumbnail(path, updated.id, kind);
        Ok(FileScanOutcome::Updated(updated))
    }

    /// Probe video duration, keeping `fallback` when probing fails
    fn duration(&self, path: &Path, kind: MediaKind, fallback: Option<f64>) -> Option<f64> {
        if kind != MediaKind::Video {
            return None;
        }
        match self.probe.video_duration(path) {
            Ok(Some(duration)) => Some(duration),
            Ok(None) => fallback,
            Err(e) => {
                log::warn!("Duration probe failed for {:?}: {}", path, e);
                fallback
            }
        }
    }

    /// Thumbnail failures are left for the next scan to retry
    fn generate_thumbnail(&self, path: &Path, id: MediaId, kind: MediaKind) {
        if let Err(e) = self.thumbnails.generate(path, id, kind) {
            log::warn!("Thumbnail generation failed for media {}: {}", id, e);
        }
    }
}
