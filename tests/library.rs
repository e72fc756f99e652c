// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end tests against real library directories

use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use shoebox::db::{DeletionState, PhotoFilter, SortOrder};
use shoebox::hashing::compute_fingerprint;
use shoebox::session::{CATALOG_FILE, LOCK_FILE};
use shoebox::{ImportControl, ImportOptions, ImportStatus, LibrarySession, ShoeboxError};

fn options(thumbnails: bool) -> ImportOptions {
    ImportOptions {
        workers: 2,
        generate_thumbnails: thumbnails,
        ..Default::default()
    }
}

fn write_png(dir: &Path, name: &str, shade: u8) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(320, 200, Rgb([shade, 40, 200 - shade / 2]))
        .save(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn test_same_file_imported_twice_is_duplicate() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let photo = write_png(src.path(), "beach.png", 10);

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let first = session.import_files(&[photo.clone()], &ImportControl::new()).await.unwrap();
    let id = first.imported_ids()[0];

    let second = session.import_files(&[photo.clone()], &ImportControl::new()).await.unwrap();
    assert_eq!(second.outcomes[0].status, ImportStatus::Duplicate { existing_id: id });

    let record = session.get_photo(id).await.unwrap().unwrap();
    assert_eq!(record.content_hash, compute_fingerprint(&photo).unwrap().as_str());
    assert!(session.absolute_path(&record).is_file());
    assert!(photo.exists(), "copy mode keeps the source");
    session.close().await;
}

#[tokio::test]
async fn test_directory_import_dedups_within_batch() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    write_png(src.path(), "a.png", 10);
    write_png(src.path(), "b.png", 90);
    fs::create_dir(src.path().join("nested")).unwrap();
    fs::copy(src.path().join("a.png"), src.path().join("nested/c.png")).unwrap();
    fs::write(src.path().join(".hidden.png"), b"ignored").unwrap();

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let summary = session
        .import_files(&[src.path().to_path_buf()], &ImportControl::new())
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 3);
    assert_eq!(summary.imported(), 2);
    assert_eq!(summary.duplicates(), 1);

    let photos = session
        .list_photos(&PhotoFilter::active(), SortOrder::ImportedAsc)
        .await
        .unwrap();
    assert_eq!(photos.len(), 2);
    assert_ne!(photos[0].content_hash, photos[1].content_hash);
    session.close().await;
}

fn media_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(media_files(&path));
        } else if path.extension().is_some_and(|e| e == "png") {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn test_same_content_in_one_wide_batch_leaves_one_file() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let first = write_png(src.path(), "first.png", 77);
    let mut sources = vec![first.clone()];
    for name in ["copy1.png", "copy2.png", "copy3.png"] {
        let copy = src.path().join(name);
        fs::copy(&first, &copy).unwrap();
        sources.push(copy);
    }

    // Enough workers that later copies pass the pre-check before the first
    // one is cataloged and are only caught at insert
    let options = ImportOptions {
        workers: 4,
        generate_thumbnails: false,
        ..Default::default()
    };
    let session = LibrarySession::create(lib.path(), options).await.unwrap();
    let summary = session.import_files(&sources, &ImportControl::new()).await.unwrap();

    assert_eq!(summary.imported(), 1);
    assert_eq!(summary.duplicates(), 3);
    let id = summary.imported_ids()[0];
    for outcome in &summary.outcomes[1..] {
        assert_eq!(outcome.status, ImportStatus::Duplicate { existing_id: id });
    }

    assert_eq!(media_files(lib.path()).len(), summary.imported());
    assert!(session.verify().await.unwrap().is_clean());
    session.close().await;
}

#[tokio::test]
async fn test_deleted_photo_can_be_reimported() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let photo = write_png(src.path(), "cat.png", 30);

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let first = session.import_files(&[photo.clone()], &ImportControl::new()).await.unwrap();
    let old_id = first.imported_ids()[0];
    session.delete_photo(old_id).await.unwrap();

    let deleted = session.get_photo(old_id).await.unwrap().unwrap();
    assert!(deleted.is_deleted);
    assert!(session.absolute_path(&deleted).is_file(), "soft delete keeps the file");

    let again = session.import_files(&[photo], &ImportControl::new()).await.unwrap();
    let new_id = again.imported_ids()[0];
    assert_ne!(new_id, old_id);

    let all = PhotoFilter::active().with_deletion(DeletionState::All);
    assert_eq!(session.list_photos(&all, SortOrder::default()).await.unwrap().len(), 2);
    session.close().await;
}

#[tokio::test]
async fn test_delete_unknown_photo() {
    let lib = tempfile::tempdir().unwrap();
    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    assert!(matches!(
        session.delete_photo(4242).await,
        Err(ShoeboxError::PhotoNotFound(4242))
    ));
    session.close().await;
}

#[tokio::test]
async fn test_verify_reports_missing_and_corrupt_files() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let a = write_png(src.path(), "a.png", 1);
    let b = write_png(src.path(), "b.png", 2);

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let summary = session.import_files(&[a, b], &ImportControl::new()).await.unwrap();
    let report = session.verify().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.checked, 2);

    let ids = summary.imported_ids();
    let first = session.get_photo(ids[0]).await.unwrap().unwrap();
    let second = session.get_photo(ids[1]).await.unwrap().unwrap();
    fs::remove_file(session.absolute_path(&first)).unwrap();
    fs::write(session.absolute_path(&second), b"bit rot").unwrap();

    let report = session.verify().await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.missing_files.len(), 1);
    assert_eq!(report.missing_files[0].id, first.id);
    assert_eq!(report.hash_mismatches.len(), 1);
    assert_eq!(report.hash_mismatches[0].id, second.id);
    session.close().await;
}

#[tokio::test]
async fn test_open_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("nowhere");
    assert!(matches!(
        LibrarySession::open(&missing, options(false)).await,
        Err(ShoeboxError::NotFound(_))
    ));

    let root = dir.path().join("lib");
    let session = LibrarySession::create(&root, options(false)).await.unwrap();
    assert!(matches!(
        LibrarySession::open(&root, options(false)).await,
        Err(ShoeboxError::LibraryLocked(_))
    ));
    session.close().await;

    assert!(matches!(
        LibrarySession::create(&root, options(false)).await,
        Err(ShoeboxError::AlreadyExists(_))
    ));
    assert!(!root.join(LOCK_FILE).exists());
}

#[tokio::test]
async fn test_catalog_from_newer_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let session = LibrarySession::create(dir.path(), options(false)).await.unwrap();
    session.close().await;

    let conn = rusqlite::Connection::open(dir.path().join(CATALOG_FILE)).unwrap();
    conn.pragma_update(None, "user_version", 99).unwrap();
    drop(conn);

    let err = LibrarySession::open(dir.path(), options(false)).await.unwrap_err();
    assert!(matches!(err, ShoeboxError::CorruptLibrary(_)));
    assert!(!dir.path().join(LOCK_FILE).exists(), "failed open releases the lock");
}

#[tokio::test]
async fn test_thumbnails_are_generated_in_background() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let good = write_png(src.path(), "good.png", 50);
    let broken = src.path().join("broken.jpg");
    fs::write(&broken, b"\xFF\xD8 not really a jpeg").unwrap();

    let session = LibrarySession::create(lib.path(), options(true)).await.unwrap();
    let summary = session
        .import_files(&[good, broken], &ImportControl::new())
        .await
        .unwrap();
    assert_eq!(summary.imported(), 2);
    session.wait_for_thumbnails().await;

    let ids = summary.imported_ids();
    let good = session.get_photo(ids[0]).await.unwrap().unwrap();
    let thumb = session.thumbnail_path(&good).expect("thumbnail recorded");
    let decoded = image::open(&thumb).unwrap();
    assert!(decoded.width() <= 256 && decoded.height() <= 256);

    // A failed thumbnail never removes the photo
    let broken = session.get_photo(ids[1]).await.unwrap().unwrap();
    assert!(broken.thumbnail_path.is_none());
    assert!(!broken.is_deleted);

    assert_eq!(session.stats().await.unwrap().missing_thumbnails, 1);
    session.close().await;
}

#[tokio::test]
async fn test_rebuild_thumbnails_after_loss() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let photo = write_png(src.path(), "p.png", 70);

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let summary = session.import_files(&[photo], &ImportControl::new()).await.unwrap();
    let id = summary.imported_ids()[0];
    assert!(session.get_photo(id).await.unwrap().unwrap().thumbnail_path.is_none());

    assert_eq!(session.rebuild_thumbnails(false).await.unwrap(), 1);
    session.wait_for_thumbnails().await;
    let record = session.get_photo(id).await.unwrap().unwrap();
    let thumb = session.thumbnail_path(&record).unwrap();
    assert!(thumb.is_file());

    assert_eq!(session.rebuild_thumbnails(false).await.unwrap(), 0);
    fs::remove_file(&thumb).unwrap();
    assert_eq!(session.verify().await.unwrap().missing_thumbnails, vec![id]);
    assert_eq!(session.rebuild_thumbnails(false).await.unwrap(), 1);
    session.wait_for_thumbnails().await;
    assert!(thumb.is_file());
    session.close().await;
}

#[tokio::test]
async fn test_cancelled_import_leaves_library_untouched() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let a = write_png(src.path(), "a.png", 5);
    let b = write_png(src.path(), "b.png", 6);

    let session = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    let control = ImportControl::new();
    control.cancel();
    let summary = session.import_files(&[a, b], &control).await.unwrap();

    assert_eq!(summary.cancelled(), 2);
    assert_eq!(summary.imported(), 0);
    assert_eq!(session.stats().await.unwrap().active, 0);
    session.close().await;
}

#[tokio::test]
async fn test_purge_removes_files_and_thumbnails() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let photo = write_png(src.path(), "old.png", 99);

    let session = LibrarySession::create(lib.path(), options(true)).await.unwrap();
    let summary = session.import_files(&[photo], &ImportControl::new()).await.unwrap();
    session.wait_for_thumbnails().await;
    let id = summary.imported_ids()[0];
    let record = session.get_photo(id).await.unwrap().unwrap();
    let file = session.absolute_path(&record);
    let thumb = session.thumbnail_path(&record).unwrap();

    session.delete_photo(id).await.unwrap();
    let report = session.purge_deleted().await.unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.thumbnails_removed, 1);
    assert!(!file.exists());
    assert!(!thumb.exists());
    assert!(session.get_photo(id).await.unwrap().is_none());
    session.compact().await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_read_only_session_rejects_writes() {
    let src = tempfile::tempdir().unwrap();
    let lib = tempfile::tempdir().unwrap();
    let photo = write_png(src.path(), "x.png", 12);

    let writer = LibrarySession::create(lib.path(), options(false)).await.unwrap();
    writer.import_files(&[photo.clone()], &ImportControl::new()).await.unwrap();
    writer.set_config("theme", "dark").await.unwrap();

    let reader = LibrarySession::open_read_only(lib.path()).await.unwrap();
    assert!(reader.is_read_only());
    assert_eq!(reader.stats().await.unwrap().active, 1);
    assert_eq!(reader.get_config("theme").await.unwrap(), Some("dark".to_string()));
    assert!(matches!(
        reader.import_files(&[photo], &ImportControl::new()).await,
        Err(ShoeboxError::ReadOnly)
    ));
    assert!(matches!(reader.set_config("theme", "light").await, Err(ShoeboxError::ReadOnly)));
    assert!(matches!(reader.purge_deleted().await, Err(ShoeboxError::ReadOnly)));
    assert!(matches!(reader.delete_config("theme").await, Err(ShoeboxError::ReadOnly)));

    assert!(writer.delete_config("theme").await.unwrap());
    assert_eq!(reader.get_config("theme").await.unwrap(), None);

    reader.close().await;
    writer.close().await;
}
