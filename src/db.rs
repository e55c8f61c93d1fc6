//! SQLite-backed catalog storage

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::path::Path;

use crate::error::ScanError;
use crate::models::{MediaId, MediaKind, MediaPatch, MediaRecord, NewMediaRecord};
use crate::repository::CatalogRepository;

const RECORD_COLUMNS: &str = "id, relative_path, kind, display_name, size_bytes, created_at, \
     modified_at, duration_seconds, indexed_at, updated_at";

/// Catalog persisted in a SQLite database
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog").finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open or create database
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Self::migrate_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Self::migrate_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database schema
    fn init_schema(conn: &Connection) -> SqliteResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                relative_path TEXT,
                kind TEXT NOT NULL,
                display_name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                modified_at INTEGER NOT NULL,
                duration_seconds REAL,
                indexed_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_size_created ON media(size_bytes, created_at);
            ",
        )?;
        Ok(())
    }

    /// Migrate schema for existing databases
    fn migrate_schema(conn: &Connection) -> SqliteResult<()> {
        // Catalogs created before relative path tracking only had display names
        let has_relative_path: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('media') WHERE name='relative_path'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_relative_path {
            log::info!("Migrating catalog: adding relative_path column");
            conn.execute("ALTER TABLE media ADD COLUMN relative_path TEXT", [])?;
        }

        conn.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_media_relative_path
                 ON media(relative_path) WHERE relative_path IS NOT NULL AND relative_path <> '';",
        )?;
        Ok(())
    }

    /// Get record count
    pub fn record_count(&self) -> SqliteResult<u64> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get(conn: &Connection, id: MediaId) -> SqliteResult<Option<MediaRecord>> {
        conn.query_row(
            &format!("SELECT {} FROM media WHERE id = ?1", RECORD_COLUMNS),
            [id.0],
            map_record,
        )
        .optional()
    }
}

fn parse_timestamp(idx: usize, value: String) -> SqliteResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn map_record(row: &Row<'_>) -> SqliteResult<MediaRecord> {
    let kind: String = row.get(2)?;
    let kind = MediaKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown media kind {:?}", kind).into(),
        )
    })?;

    Ok(MediaRecord {
        id: MediaId(row.get(0)?),
        relative_path: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        kind,
        display_name: row.get(3)?,
        size_bytes: row.get::<_, i64>(4)? as u64,
        created_at: row.get(5)?,
        modified_at: row.get(6)?,
        duration_seconds: row.get(7)?,
        indexed_at: parse_timestamp(8, row.get(8)?)?,
        updated_at: parse_timestamp(9, row.get(9)?)?,
    })
}

impl CatalogRepository for SqliteCatalog {
    fn find_by_relative_path(&self, relative_path: &str) -> Result<Option<MediaRecord>, ScanError> {
        if relative_path.is_empty() {
            return Ok(None);
        }
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM media WHERE relative_path = ?1", RECORD_COLUMNS),
                [relative_path],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_size_and_created_at(
        &self,
        size_bytes: u64,
        created_at: i64,
    ) -> Result<Vec<MediaRecord>, ScanError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media WHERE size_bytes = ?1 AND created_at = ?2 ORDER BY id",
            RECORD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![size_bytes as i64, created_at], map_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn create(&self, record: NewMediaRecord) -> Result<MediaRecord, ScanError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO media
             (relative_path, kind, display_name, size_bytes, created_at, modified_at,
              duration_seconds, indexed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                record.relative_path,
                record.kind.as_str(),
                record.display_name,
                record.size_bytes as i64,
                record.created_at,
                record.modified_at,
                record.duration_seconds,
                now,
            ],
        )?;

        let id = MediaId(conn.last_insert_rowid());
        Self::get(&conn, id)?
            .ok_or_else(|| ScanError::database_error(format!("Inserted record {} not found", id)))
    }

    fn update(&self, id: MediaId, patch: MediaPatch) -> Result<MediaRecord, ScanError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE media
             SET relative_path = ?1, display_name = ?2, size_bytes = ?3, modified_at = ?4,
                 duration_seconds = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                patch.relative_path,
                patch.display_name,
                patch.size_bytes as i64,
                patch.modified_at,
                patch.duration_seconds,
                Utc::now().to_rfc3339(),
                id.0,
            ],
        )?;

        if changed == 0 {
            return Err(ScanError::database_error(format!("No media record with id {}", id)));
        }
        Self::get(&conn, id)?
            .ok_or_else(|| ScanError::database_error(format!("No media record with id {}", id)))
    }

    fn delete(&self, id: MediaId) -> Result<(), ScanError> {
        self.conn
            .lock()
            .execute("DELETE FROM media WHERE id = ?1", [id.0])?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<MediaRecord>, ScanError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM media ORDER BY id", RECORD_COLUMNS))?;
        let rows = stmt.query_map([], map_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(path: &str, kind: MediaKind, size: u64, created: i64) -> NewMediaRecord {
        NewMediaRecord {
            relative_path: path.to_string(),
            kind,
            display_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            size_bytes: size,
            created_at: created,
            modified_at: created + 1,
            duration_seconds: (kind == MediaKind::Video).then_some(12.5),
        }
    }

    #[test]
    fn test_create_and_find() {
        let db = SqliteCatalog::open_memory().unwrap();
        let photo = db
            .create(new_record("2024/photo.jpg", MediaKind::Image, 2048, 1_700_000_000))
            .unwrap();
        let clip = db
            .create(new_record("2024/clip.mp4", MediaKind::Video, 4096, 1_700_000_000))
            .unwrap();

        assert_eq!(photo.relative_path, "2024/photo.jpg");
        assert_eq!(photo.modified_at, 1_700_000_001);
        assert_eq!(clip.duration_seconds, Some(12.5));

        let found = db.find_by_relative_path("2024/clip.mp4").unwrap().unwrap();
        assert_eq!(found.id, clip.id);
        assert_eq!(found.kind, MediaKind::Video);
        assert!(db.find_by_relative_path("nope.jpg").unwrap().is_none());

        let by_stats = db.find_by_size_and_created_at(2048, 1_700_000_000).unwrap();
        assert_eq!(by_stats.len(), 1);
        assert_eq!(by_stats[0].id, photo.id);

        assert_eq!(db.record_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_relative_path_rejected() {
        let db = SqliteCatalog::open_memory().unwrap();
        db.create(new_record("a.jpg", MediaKind::Image, 1, 1)).unwrap();
        let err = db.create(new_record("a.jpg", MediaKind::Image, 1, 1)).unwrap_err();
        assert_eq!(err.kind, crate::error::ScanErrorKind::Database);
    }

    #[test]
    fn test_update_keeps_identity() {
        let db = SqliteCatalog::open_memory().unwrap();
        let rec = db.create(new_record("a/photo.jpg", MediaKind::Image, 10, 100)).unwrap();

        let updated = db
            .update(
                rec.id,
                MediaPatch {
                    relative_path: "b/photo.jpg".to_string(),
                    display_name: "photo.jpg".to_string(),
                    size_bytes: 10,
                    modified_at: 300,
                    duration_seconds: None,
                },
            )
            .unwrap();

        assert_eq!(updated.id, rec.id);
        assert_eq!(updated.relative_path, "b/photo.jpg");
        assert_eq!(updated.created_at, 100);
        assert_eq!(updated.indexed_at, rec.indexed_at);
        assert!(db.find_by_relative_path("a/photo.jpg").unwrap().is_none());
    }

    #[test]
    fn test_update_missing_record() {
        let db = SqliteCatalog::open_memory().unwrap();
        let patch = MediaPatch {
            relative_path: "x.jpg".to_string(),
            display_name: "x.jpg".to_string(),
            size_bytes: 1,
            modified_at: 1,
            duration_seconds: None,
        };
        assert!(db.update(MediaId(99), patch).is_err());
    }

    #[test]
    fn test_delete_and_list() {
        let db = SqliteCatalog::open_memory().unwrap();
        let a = db.create(new_record("a.jpg", MediaKind::Image, 1, 1)).unwrap();
        let b = db.create(new_record("b.jpg", MediaKind::Image, 2, 2)).unwrap();

        db.delete(a.id).unwrap();
        let all = db.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, b.id);
    }

    #[test]
    fn test_migrates_legacy_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE media (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    size_bytes INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    modified_at INTEGER NOT NULL,
                    duration_seconds REAL,
                    indexed_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                INSERT INTO media (kind, display_name, size_bytes, created_at, modified_at, indexed_at, updated_at)
                VALUES ('image', 'old.jpg', 5, 5, 5, '2023-01-01T00:00:00+00:00', '2023-01-01T00:00:00+00:00');",
            )
            .unwrap();
        }

        let db = SqliteCatalog::open(&path).unwrap();
        let all = db.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_legacy());

        // Several legacy rows may coexist without violating the unique index
        db.create(new_record("new.jpg", MediaKind::Image, 6, 6)).unwrap();
        assert_eq!(db.record_count().unwrap(), 2);
    }
}
