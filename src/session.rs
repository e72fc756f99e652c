// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! An open photo library
//!
//! A [`LibrarySession`] owns one library root: its catalog, its advisory lock
//! and its thumbnail workers. There is no process-wide "current library";
//! front-ends hold a session value and call through it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{
    schema, Catalog, CatalogStats, ConfigEntry, DeletionState, PhotoFilter, PhotoRecord, SortOrder,
};
use crate::hashing::compute_fingerprint;
use crate::import::{scan_sources, ImportControl, ImportOptions, ImportPipeline, ImportSummary};
use crate::organizer::{bucket_of, Organizer};
use crate::thumbnails::{ThumbnailDeriver, ThumbnailJob, ThumbnailQueue, THUMBNAIL_DIR};
use crate::{Result, ShoeboxError};

/// Catalog file name under the library root
pub const CATALOG_FILE: &str = "library.db";

/// Library identity file
pub const INFO_FILE: &str = ".library_info";

/// Advisory lock held by a writable session
pub const LOCK_FILE: &str = ".library.lock";

/// Contents of `.library_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: u32,
    #[serde(default)]
    pub app_version: String,
}

impl LibraryInfo {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            version: schema::SCHEMA_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn read(root: &Path) -> Result<Option<Self>> {
        let path = root.join(INFO_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ShoeboxError::CorruptLibrary(format!("unreadable {}: {}", INFO_FILE, e)))
    }

    fn write(&self, root: &Path) -> Result<()> {
        let temp = root.join(format!("{}.{}.tmp", INFO_FILE, Uuid::new_v4().simple()));
        fs::write(&temp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&temp, root.join(INFO_FILE))?;
        Ok(())
    }
}

/// Lock file guard; the file is removed when the guard drops
#[derive(Debug)]
struct LibraryLock {
    path: PathBuf,
}

impl LibraryLock {
    fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let Some(pid) = Self::stale_holder(&path) else {
                    return Err(ShoeboxError::LibraryLocked(root.to_path_buf()));
                };
                warn!(?path, pid, "Removing lock left by a process that no longer exists");
                fs::remove_file(&path)?;
                match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(f) => f,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        return Err(ShoeboxError::LibraryLocked(root.to_path_buf()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "pid={}", std::process::id())?;
        writeln!(file, "since={}", Utc::now().to_rfc3339())?;
        debug!(?path, "Library lock acquired");
        Ok(Self { path })
    }
}

impl LibraryLock {
    /// Pid recorded in an existing lock file, if that process is gone
    fn stale_holder(path: &Path) -> Option<u32> {
        let content = fs::read_to_string(path).ok()?;
        let pid: u32 = content
            .lines()
            .find_map(|line| line.strip_prefix("pid="))?
            .trim()
            .parse()
            .ok()?;
        (pid != std::process::id() && !process_alive(pid)).then_some(pid)
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without a cheap liveness check the holder is assumed alive
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = ?self.path, "Failed to release library lock: {}", e);
            }
        }
    }
}

/// A record that failed the integrity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub id: i64,
    pub path: String,
    pub detail: String,
}

/// Result of [`LibrarySession::verify`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked: usize,
    pub missing_files: Vec<IntegrityIssue>,
    pub hash_mismatches: Vec<IntegrityIssue>,
    pub misplaced: Vec<IntegrityIssue>,
    /// Photos whose recorded thumbnail file is gone (derived data, not an error)
    pub missing_thumbnails: Vec<i64>,
}

impl IntegrityReport {
    /// No invariant violations (thumbnails aside)
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty() && self.hash_mismatches.is_empty() && self.misplaced.is_empty()
    }
}

/// What `purge_deleted` removed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeReport {
    pub records: usize,
    pub files_removed: usize,
    pub thumbnails_removed: usize,
}

/// One open library
pub struct LibrarySession {
    root: PathBuf,
    catalog: Catalog,
    info: LibraryInfo,
    options: ImportOptions,
    deriver: ThumbnailDeriver,
    pipeline: Option<ImportPipeline>,
    thumbnails: Option<Arc<ThumbnailQueue>>,
    // Declared last so the lock outlives everything using the library
    lock: Option<LibraryLock>,
}

impl std::fmt::Debug for LibrarySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibrarySession")
            .field("root", &self.root)
            .field("id", &self.info.id)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl LibrarySession {
    fn assemble(
        root: PathBuf,
        catalog: Catalog,
        info: LibraryInfo,
        options: ImportOptions,
        lock: Option<LibraryLock>,
    ) -> Self {
        let deriver = ThumbnailDeriver::new(root.join(THUMBNAIL_DIR), options.thumbnail_size);

        let (pipeline, thumbnails) = if lock.is_some() {
            let queue = Arc::new(ThumbnailQueue::start(
                deriver.clone(),
                catalog.clone(),
                &root,
                options.workers,
            ));
            let organizer = Organizer::with_fs(&root, options.collision_policy);
            let pipeline = ImportPipeline::new(catalog.clone(), organizer, options.clone())
                .with_thumbnails(Arc::clone(&queue));
            (Some(pipeline), Some(queue))
        } else {
            (None, None)
        };

        Self {
            root,
            catalog,
            info,
            options,
            deriver,
            pipeline,
            thumbnails,
            lock,
        }
    }

    /// Create a new library at `root`
    pub async fn create(root: impl AsRef<Path>, options: ImportOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.join(CATALOG_FILE).exists() {
            return Err(ShoeboxError::AlreadyExists(root));
        }

        fs::create_dir_all(&root)?;
        let lock = LibraryLock::acquire(&root)?;
        fs::create_dir_all(root.join(THUMBNAIL_DIR))?;

        let catalog = Catalog::create(root.join(CATALOG_FILE))?;
        let info = LibraryInfo::fresh();
        info.write(&root)?;

        info!("Created library {} at {:?}", info.id, root);
        Ok(Self::assemble(root, catalog, info, options, Some(lock)))
    }

    /// Open an existing library for writing
    pub async fn open(root: impl AsRef<Path>, options: ImportOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ShoeboxError::NotFound(root));
        }
        if !root.join(CATALOG_FILE).is_file() {
            return Err(ShoeboxError::NotFound(root.join(CATALOG_FILE)));
        }

        let lock = LibraryLock::acquire(&root)?;
        let catalog = Catalog::open(root.join(CATALOG_FILE))?;
        let info = match LibraryInfo::read(&root)? {
            Some(info) => info,
            None => {
                warn!(?root, "Library info file missing; writing a new one");
                let info = LibraryInfo::fresh();
                info.write(&root)?;
                info
            }
        };
        fs::create_dir_all(root.join(THUMBNAIL_DIR))?;

        info!("Opened library {} at {:?}", info.id, root);
        Ok(Self::assemble(root, catalog, info, options, Some(lock)))
    }

    /// Open an existing library without taking the lock. Mutating calls
    /// fail with `ReadOnly`.
    pub async fn open_read_only(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ShoeboxError::NotFound(root));
        }
        let catalog = Catalog::open_read_only(root.join(CATALOG_FILE))?;
        let info = LibraryInfo::read(&root)?.unwrap_or_else(LibraryInfo::fresh);
        debug!(?root, "Opened library read-only");
        Ok(Self::assemble(root, catalog, info, ImportOptions::default(), None))
    }

    /// Switch to another library. The new library is opened first; if that
    /// fails this session is left as it was.
    pub async fn switch(&mut self, new_root: impl AsRef<Path>) -> Result<()> {
        let next = if self.is_read_only() {
            Self::open_read_only(new_root).await?
        } else {
            Self::open(new_root, self.options.clone()).await?
        };
        let previous = std::mem::replace(self, next);
        info!("Switched library {:?} -> {:?}", previous.root, self.root);
        previous.close().await;
        Ok(())
    }

    /// Finish queued thumbnails and release the lock
    pub async fn close(mut self) {
        if let Some(queue) = self.thumbnails.take() {
            queue.shutdown().await;
        }
        self.pipeline = None;
        if self.lock.take().is_some() {
            debug!(root = ?self.root, "Library closed");
        }
    }

    /// Remove a stale lock left by a crashed session
    pub fn force_unlock(root: impl AsRef<Path>) -> Result<bool> {
        let path = root.as_ref().join(LOCK_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                warn!(?path, "Removed library lock");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn info(&self) -> &LibraryInfo {
        &self.info
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_read_only(&self) -> bool {
        self.lock.is_none()
    }

    fn writable(&self) -> Result<&ImportPipeline> {
        self.pipeline.as_ref().ok_or(ShoeboxError::ReadOnly)
    }

    /// Import files, directories or glob patterns
    pub async fn import_files(&self, sources: &[PathBuf], control: &ImportControl) -> Result<ImportSummary> {
        let pipeline = self.writable()?;
        let files = scan_sources(sources, self.options.recursive, Some(&self.root));
        Ok(pipeline.import_files(&files, control).await)
    }

    pub async fn list_photos(&self, filter: &PhotoFilter, order: SortOrder) -> Result<Vec<PhotoRecord>> {
        self.catalog.list_photos(filter, order)
    }

    pub async fn get_photo(&self, id: i64) -> Result<Option<PhotoRecord>> {
        self.catalog.get_photo(id)
    }

    /// Soft-delete a photo. Its file stays on disk until `purge_deleted`.
    pub async fn delete_photo(&self, id: i64) -> Result<()> {
        self.writable()?;
        self.catalog.mark_deleted(id)?;
        info!(id, "Photo deleted");
        Ok(())
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<String>> {
        self.catalog.get_config(key)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.writable()?;
        self.catalog.set_config(key, value)
    }

    pub async fn list_config(&self) -> Result<Vec<ConfigEntry>> {
        self.catalog.list_config()
    }

    /// Remove a setting; `false` if it was not set
    pub async fn delete_config(&self, key: &str) -> Result<bool> {
        self.writable()?;
        self.catalog.delete_config(key)
    }

    /// Reclaim catalog space, typically after a purge
    pub async fn compact(&self) -> Result<()> {
        self.writable()?;
        self.catalog.vacuum()
    }

    pub async fn stats(&self) -> Result<CatalogStats> {
        self.catalog.stats()
    }

    /// Absolute location of a record's file
    pub fn absolute_path(&self, record: &PhotoRecord) -> PathBuf {
        join_relative(&self.root, &record.path)
    }

    /// Absolute location of a record's thumbnail, if one is recorded
    pub fn thumbnail_path(&self, record: &PhotoRecord) -> Option<PathBuf> {
        record
            .thumbnail_path
            .as_deref()
            .map(|rel| join_relative(&self.root, rel))
    }

    /// Check every active record against the files on disk
    pub async fn verify(&self) -> Result<IntegrityReport> {
        let catalog = self.catalog.clone();
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || verify_library(&catalog, &root))
            .await
            .map_err(|e| ShoeboxError::CorruptLibrary(format!("verification task failed: {}", e)))?
    }

    /// Hard-delete soft-deleted records, with their files and thumbnails
    pub async fn purge_deleted(&self) -> Result<PurgeReport> {
        self.writable()?;
        let removed = self.catalog.purge_deleted()?;
        let mut report = PurgeReport {
            records: removed.len(),
            ..Default::default()
        };

        // The rows are gone, so every record gets its cleanup attempt
        for record in &removed {
            // A re-imported copy may have adopted the same file
            match self.catalog.path_in_use(&record.path) {
                Ok(true) => {}
                Ok(false) => match fs::remove_file(self.absolute_path(record)) {
                    Ok(()) => report.files_removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(id = record.id, "Could not remove purged file: {}", e),
                },
                Err(e) => warn!(id = record.id, "Could not check whether file is shared: {}", e),
            }
            match self.deriver.remove(record.id) {
                Ok(true) => report.thumbnails_removed += 1,
                Ok(false) => {}
                Err(e) => warn!(id = record.id, "Could not remove purged thumbnail: {}", e),
            }
        }

        info!(
            records = report.records,
            files = report.files_removed,
            "Purged deleted photos"
        );
        Ok(report)
    }

    /// Queue thumbnails for active photos that have none (or whose file is
    /// gone). With `force`, every active photo is re-queued.
    pub async fn rebuild_thumbnails(&self, force: bool) -> Result<usize> {
        self.writable()?;
        let queue = self.thumbnails.as_ref().ok_or(ShoeboxError::ReadOnly)?;

        let filter = PhotoFilter::default().with_deletion(DeletionState::Active);
        let mut queued = 0;
        for record in self.catalog.list_photos(&filter, SortOrder::ImportedAsc)? {
            if record.media_type == crate::metadata::MediaType::Other {
                continue;
            }
            let present = self
                .thumbnail_path(&record)
                .map(|p| p.is_file())
                .unwrap_or(false);
            if present && !force {
                continue;
            }
            let orientation = record.parsed_metadata().and_then(|m| m.orientation);
            if queue.enqueue(ThumbnailJob {
                photo_id: record.id,
                source: self.absolute_path(&record),
                media_type: record.media_type,
                orientation,
            }) {
                queued += 1;
            }
        }
        debug!(queued, "Thumbnails queued for rebuild");
        Ok(queued)
    }

    /// Wait for queued thumbnails to finish
    pub async fn wait_for_thumbnails(&self) {
        if let Some(queue) = &self.thumbnails {
            queue.wait_idle().await;
        }
    }
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|p| !p.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

fn verify_library(catalog: &Catalog, root: &Path) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    let records = catalog.list_photos(&PhotoFilter::active(), SortOrder::ImportedAsc)?;

    for record in records {
        report.checked += 1;
        let path = join_relative(root, &record.path);
        let issue = |detail: String| IntegrityIssue {
            id: record.id,
            path: record.path.clone(),
            detail,
        };

        match compute_fingerprint(&path) {
            Ok(digest) if digest.as_str() == record.content_hash => {}
            Ok(digest) => report.hash_mismatches.push(issue(format!(
                "expected {}, found {}",
                &record.content_hash[..record.content_hash.len().min(8)],
                digest.short()
            ))),
            Err(ShoeboxError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                report.missing_files.push(issue("file not found".to_string()));
                continue;
            }
            Err(e) => report.missing_files.push(issue(e.to_string())),
        }

        let expected = record.bucket_time().date_naive();
        if bucket_of(&record.path) != Some(expected) {
            report
                .misplaced
                .push(issue(format!("expected bucket {}", expected.format("%Y/%m/%d"))));
        }

        if let Some(thumb) = &record.thumbnail_path {
            if !join_relative(root, thumb).is_file() {
                report.missing_thumbnails.push(record.id);
            }
        }
    }

    if report.is_clean() {
        info!(checked = report.checked, "Library verified clean");
    } else {
        warn!(
            missing = report.missing_files.len(),
            mismatched = report.hash_mismatches.len(),
            misplaced = report.misplaced.len(),
            "Library verification found problems"
        );
    }
    Ok(report)
}
