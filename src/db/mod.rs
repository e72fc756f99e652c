// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalog database for photo records and library settings

pub mod models;
pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub use models::{
    CatalogStats, ConfigEntry, DeletionState, NewPhoto, PhotoFilter, PhotoRecord, SortOrder,
};

use crate::hashing::Fingerprint;
use crate::metadata::MediaType;
use crate::{Result, ShoeboxError};

const PHOTO_COLUMNS: &str = "id, filename, original_path, path, content_hash, size, created_at, \
     imported_at, media_type, metadata_json, thumbnail_path, is_deleted, deleted_at";

/// Catalog handle (thread-safe wrapper around one SQLite connection).
///
/// All statements are serialized on the connection mutex, and multi-statement
/// mutations run in a transaction, so a reader never sees half a write.
#[derive(Clone)]
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    read_only: bool,
}

/// Render a timestamp the way the catalog stores it (sortable RFC 3339)
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_optional_timestamp(raw: Option<String>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(&s, column)).transpose()
}

fn row_to_photo(row: &Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let imported_raw: String = row.get(7)?;
    let media_raw: String = row.get(8)?;
    let metadata_raw: Option<String> = row.get(9)?;

    let media_type = media_raw.parse::<MediaType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, Type::Text, e.to_string().into())
    })?;

    Ok(PhotoRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_path: row.get(2)?,
        path: row.get(3)?,
        content_hash: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)?.max(0) as u64,
        captured_at: parse_optional_timestamp(row.get(6)?, 6)?,
        imported_at: parse_timestamp(&imported_raw, 7)?,
        media_type,
        // A damaged blob is treated as absent rather than hiding the row
        metadata: metadata_raw.and_then(|s| serde_json::from_str(&s).ok()),
        thumbnail_path: row.get(10)?,
        is_deleted: row.get(11)?,
        deleted_at: parse_optional_timestamp(row.get(12)?, 12)?,
    })
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(|e| ShoeboxError::CorruptLibrary(format!("unreadable catalog: {}", e)))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl Catalog {
    fn wrap(conn: Connection, path: Option<PathBuf>, read_only: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            read_only,
        }
    }

    /// Create a new catalog file. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ShoeboxError::AlreadyExists(path.to_path_buf()));
        }
        let mut conn = Connection::open(path)?;
        configure(&conn)?;
        schema::migrate(&mut conn)?;
        let catalog = Self::wrap(conn, Some(path.to_path_buf()), false);
        catalog.seed()?;
        info!("Catalog created: {:?}", path);
        Ok(catalog)
    }

    /// Open an existing catalog, upgrading older schemas in place
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ShoeboxError::NotFound(path.to_path_buf()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let mut conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // Nothing is written to a catalog this build refuses
        let version = schema::validate(&conn)?;
        configure(&conn)?;
        if version < schema::SCHEMA_VERSION {
            info!("Upgrading catalog {:?} from schema version {}", path, version);
            schema::migrate(&mut conn)?;
        }
        debug!("Catalog opened: {:?}", path);
        Ok(Self::wrap(conn, Some(path.to_path_buf()), false))
    }

    /// Open an existing catalog without write access
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ShoeboxError::NotFound(path.to_path_buf()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        let version = schema::validate(&conn)?;
        if version < schema::SCHEMA_VERSION {
            return Err(ShoeboxError::CorruptLibrary(format!(
                "catalog schema version {} needs an upgrade; open it writable once",
                version
            )));
        }
        Ok(Self::wrap(conn, Some(path.to_path_buf()), true))
    }

    /// Open an in-memory catalog (for testing)
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn)?;
        schema::migrate(&mut conn)?;
        let catalog = Self::wrap(conn, None, false);
        catalog.seed()?;
        Ok(catalog)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ShoeboxError::CorruptLibrary("catalog lock poisoned".to_string()))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(ShoeboxError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn seed(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let now = format_timestamp(&Utc::now());
        conn.execute(
            "INSERT OR IGNORE INTO config (key, value, updated_at) VALUES ('db_version', ?1, ?2)",
            params![schema::SCHEMA_VERSION.to_string(), now],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO config (key, value, updated_at) VALUES ('created_at', ?1, ?1)",
            params![now],
        )?;
        Ok(())
    }

    /// Path of the catalog file, if on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Insert a new photo. This is the authoritative dedup gate: an active
    /// record with the same content hash fails with `DuplicateContent`.
    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<i64> {
        self.ensure_writable()?;
        let metadata_json = photo
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM photos WHERE content_hash = ?1 AND is_deleted = 0",
                params![photo.content_hash.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing_id) = existing {
            return Err(ShoeboxError::DuplicateContent {
                digest: photo.content_hash.to_string(),
                existing_id,
            });
        }

        let inserted = tx.execute(
            r#"INSERT INTO photos (filename, original_path, path, content_hash, size, created_at,
                                   imported_at, media_type, metadata_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                photo.filename,
                photo.original_path,
                photo.path,
                photo.content_hash.as_str(),
                photo.size_bytes as i64,
                photo.captured_at.as_ref().map(format_timestamp),
                format_timestamp(&photo.imported_at),
                photo.media_type.as_str(),
                metadata_json,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == ErrorCode::ConstraintViolation
                    && msg.as_deref().map(|m| m.contains("content_hash")).unwrap_or(false) =>
            {
                let existing_id: i64 = tx.query_row(
                    "SELECT id FROM photos WHERE content_hash = ?1 AND is_deleted = 0",
                    params![photo.content_hash.as_str()],
                    |row| row.get(0),
                )?;
                return Err(ShoeboxError::DuplicateContent {
                    digest: photo.content_hash.to_string(),
                    existing_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;
        debug!(id, hash = %photo.content_hash, path = %photo.path, "Cataloged photo");
        Ok(id)
    }

    /// Active record with the given content hash
    pub fn find_by_hash(&self, digest: &Fingerprint) -> Result<Option<PhotoRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM photos WHERE content_hash = ?1 AND is_deleted = 0",
            PHOTO_COLUMNS
        );
        conn.query_row(&sql, params![digest.as_str()], row_to_photo)
            .optional()
            .map_err(Into::into)
    }

    /// Most recent record with the given hash, deleted or not
    pub fn find_any_by_hash(&self, digest: &Fingerprint) -> Result<Option<PhotoRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM photos WHERE content_hash = ?1 ORDER BY is_deleted ASC, id DESC LIMIT 1",
            PHOTO_COLUMNS
        );
        conn.query_row(&sql, params![digest.as_str()], row_to_photo)
            .optional()
            .map_err(Into::into)
    }

    /// Record by id, including soft-deleted ones
    pub fn get_photo(&self, id: i64) -> Result<Option<PhotoRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS);
        conn.query_row(&sql, params![id], row_to_photo)
            .optional()
            .map_err(Into::into)
    }

    /// Soft-delete an active record
    pub fn mark_deleted(&self, id: i64) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE photos SET is_deleted = 1, deleted_at = ?2 WHERE id = ?1 AND is_deleted = 0",
            params![id, format_timestamp(&Utc::now())],
        )?;
        if changed == 0 {
            return Err(ShoeboxError::PhotoNotFound(id));
        }
        debug!(id, "Photo marked deleted");
        Ok(())
    }

    /// Record (or clear) the thumbnail for a photo
    pub fn update_thumbnail_path(&self, id: i64, thumbnail_path: Option<&str>) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE photos SET thumbnail_path = ?2 WHERE id = ?1",
            params![id, thumbnail_path],
        )?;
        if changed == 0 {
            return Err(ShoeboxError::PhotoNotFound(id));
        }
        Ok(())
    }

    /// List photos matching a filter
    pub fn list_photos(&self, filter: &PhotoFilter, order: SortOrder) -> Result<Vec<PhotoRecord>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match filter.deletion {
            DeletionState::Active => clauses.push("is_deleted = 0".into()),
            DeletionState::Deleted => clauses.push("is_deleted = 1".into()),
            DeletionState::All => {}
        }
        if let Some(from) = filter.from {
            values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            clauses.push(format!(
                "substr(COALESCE(created_at, imported_at), 1, 10) >= ?{}",
                values.len()
            ));
        }
        if let Some(to) = filter.to {
            values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
            clauses.push(format!(
                "substr(COALESCE(created_at, imported_at), 1, 10) <= ?{}",
                values.len()
            ));
        }
        if let Some(media_type) = filter.media_type {
            values.push(Value::Text(media_type.as_str().to_string()));
            clauses.push(format!("media_type = ?{}", values.len()));
        }
        if let Some(fragment) = filter.filename_contains.as_deref().filter(|f| !f.is_empty()) {
            values.push(Value::Text(like_pattern(fragment)));
            clauses.push(format!("filename LIKE ?{} ESCAPE '\\'", values.len()));
        }

        let mut sql = format!("SELECT {} FROM photos", PHOTO_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order.sql());

        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        values.push(Value::Integer(limit));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
        values.push(Value::Integer(filter.offset as i64));
        sql.push_str(&format!(" OFFSET ?{}", values.len()));

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let photos = stmt
            .query_map(params_from_iter(values.iter()), row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Active photos that have no thumbnail recorded yet
    pub fn photos_missing_thumbnails(&self, limit: usize) -> Result<Vec<PhotoRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM photos WHERE is_deleted = 0 AND thumbnail_path IS NULL \
             AND media_type != 'other' ORDER BY id LIMIT ?1",
            PHOTO_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let photos = stmt
            .query_map(params![limit as i64], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    /// Whether an active record stores its file at this library path
    pub fn path_in_use(&self, path: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE path = ?1 AND is_deleted = 0",
            params![path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Hard-delete all soft-deleted rows, returning what was removed
    pub fn purge_deleted(&self) -> Result<Vec<PhotoRecord>> {
        self.ensure_writable()?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let removed = {
            let sql = format!("SELECT {} FROM photos WHERE is_deleted = 1 ORDER BY id", PHOTO_COLUMNS);
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map([], row_to_photo)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        tx.execute("DELETE FROM photos WHERE is_deleted = 1", [])?;
        tx.commit()?;
        info!("Purged {} deleted photo records", removed.len());
        Ok(removed)
    }

    /// Get a setting
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT value FROM config WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Upsert a setting, refreshing its timestamp
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
            params![key, value, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    /// All settings, sorted by key
    pub fn list_config(&self) -> Result<Vec<ConfigEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM config ORDER BY key")?;
        let entries = stmt
            .query_map([], |row| {
                let updated: String = row.get(2)?;
                Ok(ConfigEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: parse_timestamp(&updated, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Remove a setting; returns whether it existed
    pub fn delete_config(&self, key: &str) -> Result<bool> {
        self.ensure_writable()?;
        let conn = self.lock_conn()?;
        let changed = conn.execute("DELETE FROM config WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Get catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.lock_conn()?;
        let (active, deleted, total_bytes): (i64, i64, i64) = conn.query_row(
            r#"SELECT COALESCE(SUM(is_deleted = 0), 0),
                      COALESCE(SUM(is_deleted = 1), 0),
                      COALESCE(SUM(CASE WHEN is_deleted = 0 THEN size ELSE 0 END), 0)
               FROM photos"#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT media_type, COUNT(*) FROM photos WHERE is_deleted = 0 GROUP BY media_type",
        )?;
        let by_media_type = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let latest: Option<String> = conn.query_row(
            "SELECT MAX(imported_at) FROM photos WHERE is_deleted = 0",
            [],
            |row| row.get(0),
        )?;
        let oldest: Option<String> = conn.query_row(
            "SELECT MIN(created_at) FROM photos WHERE is_deleted = 0 AND created_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let missing_thumbnails: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE is_deleted = 0 AND thumbnail_path IS NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(CatalogStats {
            active,
            deleted,
            total_bytes: total_bytes.max(0) as u64,
            by_media_type,
            latest_import: parse_optional_timestamp(latest, 0)?,
            oldest_capture: parse_optional_timestamp(oldest, 0)?,
            missing_thumbnails,
        })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        self.ensure_writable()?;
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint_bytes;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_refused_catalog_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE photos (id INTEGER PRIMARY KEY);").unwrap();
            conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION + 1).unwrap();
        }

        assert!(matches!(Catalog::open(&path), Err(ShoeboxError::CorruptLibrary(_))));

        let conn = Connection::open(&path).unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode, "delete");
    }

    fn new_photo(content: &[u8], name: &str, captured: Option<DateTime<Utc>>) -> NewPhoto {
        let day = captured.unwrap_or_else(Utc::now);
        NewPhoto {
            filename: name.to_string(),
            original_path: format!("/import/{}", name),
            path: format!("{}/{}", day.format("%Y/%m/%d"), name),
            content_hash: fingerprint_bytes(content),
            size_bytes: content.len() as u64,
            captured_at: captured,
            imported_at: Utc::now(),
            media_type: MediaType::Image,
            metadata: Some(serde_json::json!({ "camera": "Test Cam" })),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_insert_and_fetch_round_trip() {
        let db = Catalog::in_memory().unwrap();
        let photo = new_photo(b"aaa", "a.jpg", at(2020, 5, 17));
        let id = db.insert_photo(&photo).unwrap();

        let rec = db.get_photo(id).unwrap().unwrap();
        assert_eq!(rec.filename, "a.jpg");
        assert_eq!(rec.path, "2020/05/17/a.jpg");
        assert_eq!(rec.content_hash, photo.content_hash.as_str());
        assert_eq!(rec.size_bytes, 3);
        assert_eq!(rec.captured_at, photo.captured_at);
        assert_eq!(rec.media_type, MediaType::Image);
        assert_eq!(rec.metadata.unwrap()["camera"], "Test Cam");
        assert!(!rec.is_deleted);
        assert!(rec.thumbnail_path.is_none());

        let by_hash = db.find_by_hash(&photo.content_hash).unwrap().unwrap();
        assert_eq!(by_hash.id, id);
    }

    #[test]
    fn test_duplicate_content_is_rejected_with_existing_id() {
        let db = Catalog::in_memory().unwrap();
        let id = db.insert_photo(&new_photo(b"same", "a.jpg", at(2020, 1, 1))).unwrap();
        let err = db.insert_photo(&new_photo(b"same", "b.jpg", at(2021, 1, 1))).unwrap_err();
        match err {
            ShoeboxError::DuplicateContent { existing_id, .. } => assert_eq!(existing_id, id),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_soft_deleted_content_can_be_inserted_again() {
        let db = Catalog::in_memory().unwrap();
        let first = db.insert_photo(&new_photo(b"x", "x.jpg", at(2020, 1, 1))).unwrap();
        db.mark_deleted(first).unwrap();

        let digest = fingerprint_bytes(b"x");
        assert!(db.find_by_hash(&digest).unwrap().is_none());
        assert_eq!(db.find_any_by_hash(&digest).unwrap().unwrap().id, first);

        let second = db.insert_photo(&new_photo(b"x", "x.jpg", at(2020, 1, 1))).unwrap();
        assert_ne!(first, second);
        assert_eq!(db.find_by_hash(&digest).unwrap().unwrap().id, second);

        let old = db.get_photo(first).unwrap().unwrap();
        assert!(old.is_deleted);
        assert!(old.deleted_at.is_some());
    }

    #[test]
    fn test_mark_deleted_twice_reports_not_found() {
        let db = Catalog::in_memory().unwrap();
        let id = db.insert_photo(&new_photo(b"q", "q.jpg", None)).unwrap();
        db.mark_deleted(id).unwrap();
        assert!(matches!(db.mark_deleted(id), Err(ShoeboxError::PhotoNotFound(_))));
        assert!(matches!(db.mark_deleted(999), Err(ShoeboxError::PhotoNotFound(999))));
    }

    #[test]
    fn test_list_filters_and_ordering() {
        let db = Catalog::in_memory().unwrap();
        let a = db.insert_photo(&new_photo(b"1", "beach.jpg", at(2019, 8, 1))).unwrap();
        let b = db.insert_photo(&new_photo(b"2", "party.jpg", at(2020, 12, 31))).unwrap();
        let mut video = new_photo(b"3", "clip.mp4", at(2020, 6, 15));
        video.media_type = MediaType::Video;
        let c = db.insert_photo(&video).unwrap();
        let d = db.insert_photo(&new_photo(b"4", "gone.jpg", at(2020, 7, 1))).unwrap();
        db.mark_deleted(d).unwrap();

        let all_active = db.list_photos(&PhotoFilter::active(), SortOrder::CapturedAsc).unwrap();
        let ids: Vec<i64> = all_active.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, c, b]);

        let newest_first = db.list_photos(&PhotoFilter::active(), SortOrder::CapturedDesc).unwrap();
        assert_eq!(newest_first.first().unwrap().id, b);

        let in_2020 = PhotoFilter::active().between(
            NaiveDate::from_ymd_opt(2020, 1, 1),
            NaiveDate::from_ymd_opt(2020, 12, 31),
        );
        let ids: Vec<i64> = db
            .list_photos(&in_2020, SortOrder::CapturedAsc)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![c, b]);

        let videos = db
            .list_photos(&PhotoFilter::active().with_media_type(MediaType::Video), SortOrder::default())
            .unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, c);

        let deleted = db
            .list_photos(&PhotoFilter::active().with_deletion(DeletionState::Deleted), SortOrder::default())
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, d);

        let everything = db
            .list_photos(&PhotoFilter::active().with_deletion(DeletionState::All), SortOrder::ImportedAsc)
            .unwrap();
        assert_eq!(everything.len(), 4);

        let limited = db.list_photos(&PhotoFilter::active().with_limit(2), SortOrder::CapturedAsc).unwrap();
        assert_eq!(limited.len(), 2);

        let by_name = PhotoFilter {
            filename_contains: Some("par".into()),
            ..Default::default()
        };
        assert_eq!(db.list_photos(&by_name, SortOrder::default()).unwrap()[0].id, b);
    }

    #[test]
    fn test_filename_filter_escapes_wildcards() {
        let db = Catalog::in_memory().unwrap();
        db.insert_photo(&new_photo(b"1", "img_1.jpg", None)).unwrap();
        db.insert_photo(&new_photo(b"2", "imgX1.jpg", None)).unwrap();
        let filter = PhotoFilter {
            filename_contains: Some("img_".into()),
            ..Default::default()
        };
        let hits = db.list_photos(&filter, SortOrder::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "img_1.jpg");
    }

    #[test]
    fn test_thumbnail_path_update() {
        let db = Catalog::in_memory().unwrap();
        let id = db.insert_photo(&new_photo(b"t", "t.jpg", None)).unwrap();
        assert_eq!(db.photos_missing_thumbnails(10).unwrap().len(), 1);

        db.update_thumbnail_path(id, Some("thumbnails/1.jpg")).unwrap();
        let rec = db.get_photo(id).unwrap().unwrap();
        assert_eq!(rec.thumbnail_path.as_deref(), Some("thumbnails/1.jpg"));
        assert!(db.photos_missing_thumbnails(10).unwrap().is_empty());

        assert!(matches!(
            db.update_thumbnail_path(42, None),
            Err(ShoeboxError::PhotoNotFound(42))
        ));
    }

    #[test]
    fn test_config_upsert_refreshes_timestamp() {
        let db = Catalog::in_memory().unwrap();
        assert_eq!(db.get_config("db_version").unwrap().as_deref(), Some("2"));
        assert!(db.get_config("missing").unwrap().is_none());

        db.set_config("theme", "dark").unwrap();
        let first = db.list_config().unwrap().into_iter().find(|e| e.key == "theme").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.set_config("theme", "light").unwrap();
        let second = db.list_config().unwrap().into_iter().find(|e| e.key == "theme").unwrap();

        assert_eq!(db.get_config("theme").unwrap().as_deref(), Some("light"));
        assert!(second.updated_at > first.updated_at);

        assert!(db.delete_config("theme").unwrap());
        assert!(!db.delete_config("theme").unwrap());
    }

    #[test]
    fn test_purge_removes_only_deleted_rows() {
        let db = Catalog::in_memory().unwrap();
        let keep = db.insert_photo(&new_photo(b"k", "k.jpg", None)).unwrap();
        let drop = db.insert_photo(&new_photo(b"d", "d.jpg", None)).unwrap();
        db.mark_deleted(drop).unwrap();

        let purged = db.purge_deleted().unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, drop);
        assert!(db.get_photo(drop).unwrap().is_none());
        assert!(db.get_photo(keep).unwrap().is_some());
    }

    #[test]
    fn test_stats() {
        let db = Catalog::in_memory().unwrap();
        db.insert_photo(&new_photo(b"abcd", "a.jpg", at(2018, 3, 3))).unwrap();
        let gone = db.insert_photo(&new_photo(b"ef", "b.jpg", at(2019, 3, 3))).unwrap();
        db.mark_deleted(gone).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.total_bytes, 4);
        assert_eq!(stats.by_media_type.get("image"), Some(&1));
        assert_eq!(stats.oldest_capture, at(2018, 3, 3));
        assert_eq!(stats.missing_thumbnails, 1);
    }

    #[test]
    fn test_open_missing_and_create_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        assert!(matches!(Catalog::open(&path), Err(ShoeboxError::NotFound(_))));

        Catalog::create(&path).unwrap();
        assert!(matches!(Catalog::create(&path), Err(ShoeboxError::AlreadyExists(_))));
        assert!(Catalog::open(&path).is_ok());
    }

    #[test]
    fn test_open_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();
        assert!(matches!(Catalog::open(&path), Err(ShoeboxError::CorruptLibrary(_))));
    }

    #[test]
    fn test_read_only_catalog_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        Catalog::create(&path).unwrap();

        let ro = Catalog::open_read_only(&path).unwrap();
        assert!(ro.is_read_only());
        assert!(matches!(ro.set_config("k", "v"), Err(ShoeboxError::ReadOnly)));
        assert!(ro.get_config("db_version").unwrap().is_some());
    }
}
