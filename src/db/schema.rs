// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalog schema and additive migrations
//!
//! The schema version lives in `PRAGMA user_version`. Migrations only ever add
//! tables, columns and indexes, so an older catalog opened by a newer build is
//! upgraded in place, and a catalog newer than this build is refused.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::{Result, ShoeboxError};

/// Highest schema version this build understands
pub const SCHEMA_VERSION: u32 = 2;

/// Migration `n` upgrades a catalog from version `n` to `n + 1`
const MIGRATIONS: &[&str] = &[
    // 1: photos and config
    r#"
    CREATE TABLE photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        original_path TEXT NOT NULL,
        path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        size INTEGER NOT NULL,
        created_at TEXT,
        imported_at TEXT NOT NULL,
        media_type TEXT NOT NULL,
        metadata_json TEXT,
        thumbnail_path TEXT,
        is_deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE UNIQUE INDEX idx_photos_active_hash ON photos(content_hash) WHERE is_deleted = 0;
    CREATE UNIQUE INDEX idx_photos_active_path ON photos(path) WHERE is_deleted = 0;
    CREATE INDEX idx_photos_hash ON photos(content_hash);
    CREATE INDEX idx_photos_created_at ON photos(created_at);
    CREATE INDEX idx_photos_imported_at ON photos(imported_at);
    CREATE INDEX idx_photos_media_type ON photos(media_type);
    CREATE INDEX idx_photos_is_deleted ON photos(is_deleted);

    CREATE TABLE config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    "#,
    // 2: deletion audit timestamp
    r#"
    ALTER TABLE photos ADD COLUMN deleted_at TEXT;
    "#,
];

/// Read the stored schema version
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| ShoeboxError::CorruptLibrary(format!("unreadable catalog: {}", e)))?;
    Ok(version)
}

fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Check that an existing catalog can be opened by this build
pub fn validate(conn: &Connection) -> Result<u32> {
    let version = schema_version(conn)?;
    if version > SCHEMA_VERSION {
        return Err(ShoeboxError::CorruptLibrary(format!(
            "catalog schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    if version == 0 || !has_table(conn, "photos")? || !has_table(conn, "config")? {
        return Err(ShoeboxError::CorruptLibrary(
            "file is not a photo catalog".to_string(),
        ));
    }
    Ok(version)
}

/// Apply every pending migration in a single transaction
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(ShoeboxError::CorruptLibrary(format!(
            "catalog schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }
    if current == SCHEMA_VERSION {
        return Ok(current);
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        tx.execute_batch(sql)?;
        info!("Applied catalog migration {}", index + 1);
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_migrates_to_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(validate(&conn).unwrap(), SCHEMA_VERSION);
        // Idempotent
        assert_eq!(migrate(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_version_one_catalog_is_upgraded_additively() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        conn.execute(
            "INSERT INTO photos (filename, original_path, path, content_hash, size, imported_at, media_type)
             VALUES ('a.jpg', '/src/a.jpg', '2020/01/01/a.jpg', 'abc', 3, '2020-01-01T00:00:00Z', 'image')",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        let (name, deleted_at): (String, Option<String>) = conn
            .query_row("SELECT filename, deleted_at FROM photos", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "a.jpg");
        assert!(deleted_at.is_none());
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();

        assert!(matches!(validate(&conn), Err(ShoeboxError::CorruptLibrary(_))));
        assert!(matches!(migrate(&mut conn), Err(ShoeboxError::CorruptLibrary(_))));
    }

    #[test]
    fn test_unrelated_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT);").unwrap();
        assert!(matches!(validate(&conn), Err(ShoeboxError::CorruptLibrary(_))));
    }

    #[test]
    fn test_active_hash_uniqueness_ignores_deleted_rows() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        let insert = "INSERT INTO photos (filename, original_path, path, content_hash, size, imported_at, media_type, is_deleted)
                      VALUES ('a', 'a', ?1, 'h1', 1, 'now', 'image', ?2)";
        conn.execute(insert, rusqlite::params!["p1", 1]).unwrap();
        conn.execute(insert, rusqlite::params!["p2", 0]).unwrap();
        assert!(conn.execute(insert, rusqlite::params!["p3", 0]).is_err());
    }
}
