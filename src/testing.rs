//! Test doubles shared by the unit tests

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::models::{FileStats, MediaId, MediaKind, MediaPatch, MediaRecord, NewMediaRecord};
use crate::repository::{CatalogRepository, MemoryCatalog};
use crate::thumbnail::{MediaProbe, ThumbnailService};
use crate::walker::{DirectoryWalker, WalkItem};

/// Thumbnail service that remembers which ids have a thumbnail
#[derive(Debug, Default)]
pub struct RecordingThumbnails {
    present: Mutex<HashSet<MediaId>>,
    generated: Mutex<Vec<(MediaId, MediaKind)>>,
    fail: Mutex<bool>,
}

impl RecordingThumbnails {
    /// Ids passed to `generate`, in call order
    pub fn generated(&self) -> Vec<MediaId> {
        self.generated.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Kinds passed to `generate`, in call order
    pub fn generated_kinds(&self) -> Vec<MediaKind> {
        self.generated.lock().iter().map(|(_, kind)| *kind).collect()
    }

    /// Simulate a thumbnail deleted out-of-band
    pub fn remove(&self, id: MediaId) {
        self.present.lock().remove(&id);
    }

    /// Make subsequent `generate` calls fail
    pub fn fail_next(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

impl ThumbnailService for RecordingThumbnails {
    fn generate(&self, path: &Path, id: MediaId, kind: MediaKind) -> Result<(), ScanError> {
        self.generated.lock().push((id, kind));
        if *self.fail.lock() {
            return Err(ScanError::thumbnail(path.to_path_buf(), "decoder unavailable"));
        }
        self.present.lock().insert(id);
        Ok(())
    }

    fn exists(&self, id: MediaId) -> bool {
        self.present.lock().contains(&id)
    }
}

/// Probe returning a fixed duration
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub Option<f64>);

impl MediaProbe for StaticProbe {
    fn video_duration(&self, _path: &Path) -> Result<Option<f64>, ScanError> {
        Ok(self.0)
    }
}

/// Walker that blocks each walk until a release signal arrives
pub struct GatedWalker<W> {
    inner: W,
    release: Receiver<()>,
}

impl<W: DirectoryWalker> GatedWalker<W> {
    pub fn new(inner: W) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { inner, release: rx }, tx)
    }
}

impl<W: DirectoryWalker> DirectoryWalker for GatedWalker<W> {
    fn walk<'a>(&'a self, root: &'a Path) -> Box<dyn Iterator<Item = WalkItem> + 'a> {
        // A dropped sender also releases the walk
        let _ = self.release.recv();
        self.inner.walk(root)
    }
}

/// Catalog whose `create` panics, for exercising panics inside a scan
#[derive(Debug, Default)]
pub struct PanickingCatalog {
    inner: MemoryCatalog,
}

impl CatalogRepository for PanickingCatalog {
    fn find_by_relative_path(&self, relative_path: &str) -> Result<Option<MediaRecord>, ScanError> {
        self.inner.find_by_relative_path(relative_path)
    }

    fn find_by_size_and_created_at(
        &self,
        size_bytes: u64,
        created_at: i64,
    ) -> Result<Vec<MediaRecord>, ScanError> {
        self.inner.find_by_size_and_created_at(size_bytes, created_at)
    }

    fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, ScanError> {
        panic!("storage backend crashed while creating {}", record.relative_path);
    }

    fn update(&self, id: MediaId, patch: MediaPatch) -> Result<MediaRecord, ScanError> {
        self.inner.update(id, patch)
    }

    fn delete(&self, id: MediaId) -> Result<(), ScanError> {
        self.inner.delete(id)
    }

    fn list_all(&self) -> Result<Vec<MediaRecord>, ScanError> {
        self.inner.list_all()
    }
}

/// Write two files with identical contents and the same creation second
///
/// Retries when the writes straddle a second boundary and fails the test if
/// the timestamps never line up.
pub fn write_twins(root: &Path, first: &str, second: &str, contents: &[u8]) -> (PathBuf, PathBuf) {
    let write = |rel: &str| {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    };

    for _ in 0..5 {
        let a = write(first);
        let b = write(second);
        let stats_a = FileStats::read(&a).unwrap();
        let stats_b = FileStats::read(&b).unwrap();
        if stats_a.created_at == stats_b.created_at {
            return (a, b);
        }
        fs::remove_file(&a).unwrap();
        fs::remove_file(&b).unwrap();
    }

    let a = write(first);
    let b = write(second);
    assert_eq!(
        FileStats::read(&a).unwrap().created_at,
        FileStats::read(&b).unwrap().created_at,
        "files written back to back should share a creation second"
    );
    (a, b)
}
