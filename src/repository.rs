//! Catalog repository contract and an in-process implementation

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::error::ScanError;
use crate::models::{MediaId, MediaPatch, MediaRecord, NewMediaRecord};

/// Persistent store of media records consumed by the scanner
pub trait CatalogRepository: Send + Sync {
    fn find_by_relative_path(&self, relative_path: &str) -> Result<Option<MediaRecord>, ScanError>;

    fn find_by_size_and_created_at(
        &self,
        size_bytes: u64,
        created_at: i64,
    ) -> Result<Vec<MediaRecord>, ScanError>;

    fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, ScanError>;

    fn update(&self, id: MediaId, patch: MediaPatch) -> Result<MediaRecord, ScanError>;

    fn delete(&self, id: MediaId) -> Result<(), ScanError>;

    fn list_all(&self) -> Result<Vec<MediaRecord>, ScanError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: BTreeMap<MediaId, MediaRecord>,
}

/// Catalog held in memory, ids assigned in increasing order
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<MemoryState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record, e.g. a legacy row without a relative path
    pub fn insert(&self, record: MediaRecord) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(record.id.0);
        state.records.insert(record.id, record);
    }

    pub fn get(&self, id: MediaId) -> Option<MediaRecord> {
        self.state.lock().records.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CatalogRepository for MemoryCatalog {
    fn find_by_relative_path(&self, relative_path: &str) -> Result<Option<MediaRecord>, ScanError> {
        if relative_path.is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .lock()
            .records
            .values()
            .find(|r| r.relative_path == relative_path)
            .cloned())
    }

    fn find_by_size_and_created_at(
        &self,
        size_bytes: u64,
        created_at: i64,
    ) -> Result<Vec<MediaRecord>, ScanError> {
        Ok(self
            .state
            .lock()
            .records
            .values()
            .filter(|r| r.size_bytes == size_bytes && r.created_at == created_at)
            .cloned()
            .collect())
    }

    fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, ScanError> {
        let mut state = self.state.lock();
        if state
            .records
            .values()
            .any(|r| !r.is_legacy() && r.relative_path == record.relative_path)
        {
            return Err(ScanError::database_error(format!(
                "Duplicate relative path: {}",
                record.relative_path
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let created = MediaRecord {
            id: MediaId(state.next_id),
            relative_path: record.relative_path,
            kind: record.kind,
            display_name: record.display_name,
            size_bytes: record.size_bytes,
            created_at: record.created_at,
            modified_at: record.modified_at,
            duration_seconds: record.duration_seconds,
            indexed_at: now,
            updated_at: now,
        };
        state.records.insert(created.id, created.clone());
        Ok(created)
    }

    fn update(&self, id: MediaId, patch: MediaPatch) -> Result<MediaRecord, ScanError> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| ScanError::database_error(format!("No media record with id {}", id)))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    fn delete(&self, id: MediaId) -> Result<(), ScanError> {
        self.state.lock().records.remove(&id);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<MediaRecord>, ScanError> {
        Ok(self.state.lock().records.values().cloned().collect())
    }
}
