// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch import pipeline
//!
//! Two stages per batch:
//! - Analysis (parallel, bounded): type check, fingerprint, dedup pre-check
//!   and metadata extraction on the blocking pool.
//! - Commit (serialized per library): placement, catalog insert, thumbnail
//!   enqueue. Results are committed in input order.
//!
//! Every file ends with exactly one [`ImportStatus`]; a failing file never
//! aborts the rest of the batch.

pub mod scan;

pub use scan::{scan_sources, should_import};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::db::{Catalog, NewPhoto};
use crate::hashing::{compute_fingerprint, Fingerprint};
use crate::metadata::{self, CaptureSource, MediaType, Metadata};
use crate::organizer::{CollisionPolicy, Organizer, Placement, TransferMode};
use crate::thumbnails::{ThumbnailJob, ThumbnailQueue, DEFAULT_MAX_DIMENSION};
use crate::ShoeboxError;

/// What to do with content that only exists as a soft-deleted record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletedContentPolicy {
    /// Import it again as a new record
    #[default]
    Reimport,
    /// Report it as a duplicate of the deleted record
    Skip,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_true() -> bool {
    true
}

fn default_thumbnail_size() -> u32 {
    DEFAULT_MAX_DIMENSION
}

/// Import behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub transfer_mode: TransferMode,

    #[serde(default)]
    pub collision_policy: CollisionPolicy,

    #[serde(default)]
    pub deleted_content_policy: DeletedContentPolicy,

    /// Parallel analysis workers (also sizes the thumbnail pool)
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_true")]
    pub generate_thumbnails: bool,

    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Accept files that are neither images nor videos
    #[serde(default)]
    pub allow_other_media: bool,

    /// Descend into subdirectories when scanning
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            transfer_mode: TransferMode::default(),
            collision_policy: CollisionPolicy::default(),
            deleted_content_policy: DeletedContentPolicy::default(),
            workers: default_workers(),
            generate_thumbnails: true,
            thumbnail_size: default_thumbnail_size(),
            allow_other_media: false,
            recursive: true,
        }
    }
}

/// Per-file progress through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Pending,
    Hashed,
    DedupChecked,
    MetadataExtracted,
    Placed,
    Cataloged,
    ThumbnailQueued,
    Rejected,
    Failed,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Hashed => "hashed",
            Self::DedupChecked => "dedup_checked",
            Self::MetadataExtracted => "metadata_extracted",
            Self::Placed => "placed",
            Self::Cataloged => "cataloged",
            Self::ThumbnailQueued => "thumbnail_queued",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final result for one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    Imported { id: i64, path: String },
    /// Content already cataloged
    Duplicate { existing_id: i64 },
    /// `stage` is the last stage the file completed
    Failed { stage: ImportStage, error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub source: PathBuf,
    #[serde(flatten)]
    pub status: ImportStatus,
}

/// Per-file outcomes of a batch, in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportSummary {
    fn count(&self, pred: impl Fn(&ImportStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn imported(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Imported { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Duplicate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, ImportStatus::Cancelled))
    }

    /// Ids of the records created by this batch
    pub fn imported_ids(&self) -> Vec<i64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                ImportStatus::Imported { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

/// Progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub index: usize,
    pub total: usize,
    pub source: PathBuf,
    pub stage: ImportStage,
}

/// Cancellation token plus optional progress sink for one or more batches.
/// Clones share the same cancellation state.
#[derive(Debug, Clone)]
pub struct ImportControl {
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
    progress: Option<mpsc::UnboundedSender<ImportProgress>>,
}

impl Default for ImportControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportControl {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cancel_tx: Arc::new(tx),
            cancel_rx: rx,
            progress: None,
        }
    }

    /// Also send progress events to `tx`
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ImportProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Request cancellation. Files not yet placed end as `Cancelled`.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    fn report(&self, index: usize, total: usize, source: &Path, stage: ImportStage) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(ImportProgress {
                index,
                total,
                source: source.to_path_buf(),
                stage,
            });
        }
    }
}

/// Analysis-stage result for one file
struct Analysis {
    digest: Fingerprint,
    size_bytes: u64,
    media_type: MediaType,
    metadata: Metadata,
    captured_at: DateTime<Utc>,
}

enum Analyzed {
    Ready(Analysis),
    Settled(ImportStatus),
}

fn failed(stage: ImportStage, error: impl fmt::Display) -> Analyzed {
    Analyzed::Settled(ImportStatus::Failed {
        stage,
        error: error.to_string(),
    })
}

/// Resolve the capture time: embedded, then file mtime, then now
fn resolve_capture_time(source: &Path, metadata: &mut Metadata) -> DateTime<Utc> {
    if let Some(ts) = metadata.captured_at {
        metadata.captured_at_source = Some(CaptureSource::Embedded);
        return ts;
    }
    let (ts, origin) = match metadata::file_modified_at(source) {
        Some(ts) => (ts, CaptureSource::FileModified),
        None => (metadata::wall_clock_now(), CaptureSource::Imported),
    };
    metadata.captured_at = Some(ts);
    metadata.captured_at_source = Some(origin);
    ts
}

#[derive(Clone)]
struct AnalysisContext {
    catalog: Catalog,
    options: ImportOptions,
    control: ImportControl,
    total: usize,
}

impl AnalysisContext {
    fn analyze(&self, index: usize, source: &Path) -> Analyzed {
        if self.control.is_cancelled() {
            return Analyzed::Settled(ImportStatus::Cancelled);
        }

        let file_meta = match std::fs::metadata(source) {
            Ok(m) => m,
            Err(e) => return failed(ImportStage::Pending, ShoeboxError::Io(e)),
        };
        if !file_meta.is_file() {
            return failed(
                ImportStage::Pending,
                ShoeboxError::UnsupportedFileType(format!("{:?} is not a regular file", source)),
            );
        }

        let media_type = MediaType::from_path(source);
        if media_type == MediaType::Other && !self.options.allow_other_media {
            let ext = source
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "(none)".to_string());
            return failed(ImportStage::Pending, ShoeboxError::UnsupportedFileType(ext));
        }

        let digest = match compute_fingerprint(source) {
            Ok(d) => d,
            Err(e) => return failed(ImportStage::Pending, e),
        };
        self.control.report(index, self.total, source, ImportStage::Hashed);

        match self.catalog.find_by_hash(&digest) {
            Ok(Some(existing)) => {
                debug!(?source, existing_id = existing.id, "Content already cataloged");
                return Analyzed::Settled(ImportStatus::Duplicate { existing_id: existing.id });
            }
            Ok(None) => {}
            Err(e) => return failed(ImportStage::Hashed, e),
        }
        if self.options.deleted_content_policy == DeletedContentPolicy::Skip {
            match self.catalog.find_any_by_hash(&digest) {
                Ok(Some(deleted)) => {
                    debug!(?source, deleted_id = deleted.id, "Content was deleted; skipping");
                    return Analyzed::Settled(ImportStatus::Duplicate { existing_id: deleted.id });
                }
                Ok(None) => {}
                Err(e) => return failed(ImportStage::Hashed, e),
            }
        }
        self.control.report(index, self.total, source, ImportStage::DedupChecked);

        let mut metadata = metadata::extract(source, media_type);
        let captured_at = resolve_capture_time(source, &mut metadata);
        self.control.report(index, self.total, source, ImportStage::MetadataExtracted);

        Analyzed::Ready(Analysis {
            digest,
            size_bytes: file_meta.len(),
            media_type,
            metadata,
            captured_at,
        })
    }
}

/// Imports batches of files into one library
#[derive(Clone)]
pub struct ImportPipeline {
    catalog: Catalog,
    organizer: Organizer,
    options: ImportOptions,
    thumbnails: Option<Arc<ThumbnailQueue>>,
    commit_lock: Arc<Mutex<()>>,
}

impl ImportPipeline {
    pub fn new(catalog: Catalog, organizer: Organizer, options: ImportOptions) -> Self {
        Self {
            catalog,
            organizer,
            options,
            thumbnails: None,
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Enqueue thumbnails for imported photos on this queue
    pub fn with_thumbnails(mut self, queue: Arc<ThumbnailQueue>) -> Self {
        self.thumbnails = Some(queue);
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import `paths` (already expanded to files). Returns one outcome per
    /// input path, in input order.
    pub async fn import_files(&self, paths: &[PathBuf], control: &ImportControl) -> ImportSummary {
        let total = paths.len();
        info!("Importing {} files", total);

        let ctx = AnalysisContext {
            catalog: self.catalog.clone(),
            options: self.options.clone(),
            control: control.clone(),
            total,
        };

        let mut analyses = stream::iter(paths.iter().cloned().enumerate())
            .map(|(index, source)| {
                let ctx = ctx.clone();
                async move {
                    let path = source.clone();
                    let analyzed = tokio::task::spawn_blocking(move || ctx.analyze(index, &path))
                        .await
                        .unwrap_or_else(|e| failed(ImportStage::Pending, format!("analysis task panicked: {}", e)));
                    (index, source, analyzed)
                }
            })
            .buffered(self.options.workers.max(1));

        let mut summary = ImportSummary::default();
        while let Some((index, source, analyzed)) = analyses.next().await {
            let status = match analyzed {
                Analyzed::Settled(status) => status,
                Analyzed::Ready(analysis) => self.commit(index, total, &source, analysis, control).await,
            };

            let terminal = match &status {
                ImportStatus::Duplicate { .. } => Some(ImportStage::Rejected),
                ImportStatus::Failed { .. } => Some(ImportStage::Failed),
                _ => None,
            };
            if let Some(stage) = terminal {
                control.report(index, total, &source, stage);
            }
            match &status {
                ImportStatus::Failed { stage, error } => {
                    warn!(?source, %stage, "Import failed: {}", error)
                }
                ImportStatus::Duplicate { existing_id } => {
                    debug!(?source, existing_id, "Skipped duplicate")
                }
                _ => {}
            }

            summary.outcomes.push(ImportOutcome { source, status });
        }

        info!(
            imported = summary.imported(),
            duplicates = summary.duplicates(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            "Import batch finished"
        );
        summary
    }

    async fn commit(
        &self,
        index: usize,
        total: usize,
        source: &Path,
        analysis: Analysis,
        control: &ImportControl,
    ) -> ImportStatus {
        let _guard = self.commit_lock.lock().await;

        if control.is_cancelled() {
            return ImportStatus::Cancelled;
        }

        let media_type = analysis.media_type;
        let orientation = analysis.metadata.orientation;
        let committer = Committer {
            catalog: self.catalog.clone(),
            organizer: self.organizer.clone(),
            transfer_mode: self.options.transfer_mode,
            control: control.clone(),
            index,
            total,
            source: source.to_path_buf(),
        };

        // Copy, fsync and re-hash run on the blocking pool while the guard
        // keeps commits serialized
        let committed = tokio::task::spawn_blocking(move || committer.run(analysis))
            .await
            .unwrap_or_else(|e| {
                Err(ImportStatus::Failed {
                    stage: ImportStage::MetadataExtracted,
                    error: format!("commit task panicked: {}", e),
                })
            });
        let (id, placement) = match committed {
            Ok(done) => done,
            Err(status) => return status,
        };

        if self.options.generate_thumbnails && media_type != MediaType::Other {
            if let Some(queue) = &self.thumbnails {
                let queued = queue.enqueue(ThumbnailJob {
                    photo_id: id,
                    source: placement.absolute_path.clone(),
                    media_type,
                    orientation,
                });
                if queued {
                    control.report(index, total, source, ImportStage::ThumbnailQueued);
                }
            }
        }

        ImportStatus::Imported {
            id,
            path: placement.relative_path,
        }
    }
}

/// Placement and catalog insert for one analyzed file
struct Committer {
    catalog: Catalog,
    organizer: Organizer,
    transfer_mode: TransferMode,
    control: ImportControl,
    index: usize,
    total: usize,
    source: PathBuf,
}

impl Committer {
    fn run(self, analysis: Analysis) -> Result<(i64, Placement), ImportStatus> {
        let source = self.source.as_path();

        // The source is only removed once the record exists
        let placement = self
            .organizer
            .place_file(source, &analysis.digest, analysis.captured_at, TransferMode::Copy)
            .map_err(|e| ImportStatus::Failed {
                stage: ImportStage::MetadataExtracted,
                error: e.to_string(),
            })?;
        self.control.report(self.index, self.total, source, ImportStage::Placed);

        let new_photo = NewPhoto {
            filename: placement.file_name().to_string(),
            original_path: source.to_string_lossy().into_owned(),
            path: placement.relative_path.clone(),
            content_hash: analysis.digest.clone(),
            size_bytes: analysis.size_bytes,
            captured_at: Some(analysis.captured_at),
            imported_at: Utc::now(),
            media_type: analysis.media_type,
            metadata: serde_json::to_value(&analysis.metadata).ok(),
        };

        let id = match self.catalog.insert_photo(&new_photo) {
            Ok(id) => id,
            Err(e) => {
                self.roll_back(&placement);
                return Err(match e {
                    ShoeboxError::DuplicateContent { existing_id, .. } => {
                        ImportStatus::Duplicate { existing_id }
                    }
                    other => ImportStatus::Failed {
                        stage: ImportStage::Placed,
                        error: other.to_string(),
                    },
                });
            }
        };
        self.control.report(self.index, self.total, source, ImportStage::Cataloged);

        if self.transfer_mode == TransferMode::Move && placement.absolute_path != source {
            if let Err(e) = std::fs::remove_file(source) {
                warn!(?source, "Imported but could not remove source: {}", e);
            }
        }

        Ok((id, placement))
    }

    fn roll_back(&self, placement: &Placement) {
        if let Err(e) = self.organizer.remove_placed(placement) {
            warn!(path = %placement.relative_path, "Rollback of placed file failed: {}", e);
        }
    }
}
