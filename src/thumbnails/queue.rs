// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Background thumbnail worker pool
//!
//! Import enqueues a job per cataloged photo and moves on. Workers decode on
//! the blocking pool and record the result in the catalog. A failed job is
//! logged and leaves the photo without a thumbnail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::ThumbnailDeriver;
use crate::db::Catalog;
use crate::metadata::{MediaType, Orientation};

/// One thumbnail to derive
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub photo_id: i64,
    pub source: PathBuf,
    pub media_type: MediaType,
    pub orientation: Option<Orientation>,
}

struct Shared {
    deriver: ThumbnailDeriver,
    catalog: Catalog,
    library_root: PathBuf,
    pending: AtomicUsize,
    idle: Notify,
}

impl Shared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.library_root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    fn run(&self, job: &ThumbnailJob) -> crate::Result<String> {
        let path = self
            .deriver
            .derive(job.photo_id, &job.source, job.media_type, job.orientation)?;
        let relative = self.relative(&path);
        self.catalog.update_thumbnail_path(job.photo_id, Some(&relative))?;
        Ok(relative)
    }
}

/// Bounded pool of thumbnail workers
pub struct ThumbnailQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<ThumbnailJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl ThumbnailQueue {
    /// Start `workers` worker tasks. Must be called inside a tokio runtime.
    pub fn start(
        deriver: ThumbnailDeriver,
        catalog: Catalog,
        library_root: impl Into<PathBuf>,
        workers: usize,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<ThumbnailJob>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shared = Arc::new(Shared {
            deriver,
            catalog,
            library_root: library_root.into(),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        });

        let count = workers.max(1);
        let handles = (0..count)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { worker_loop(worker_id, rx, shared).await })
            })
            .collect();

        debug!(workers = count, "Started thumbnail queue");

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            shared,
        }
    }

    /// Queue a job. Returns false once the queue is shut down.
    pub fn enqueue(&self, job: ThumbnailJob) -> bool {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match tx.send(job) {
            Ok(()) => true,
            Err(_) => {
                self.shared.finish_one();
                false
            }
        }
    }

    /// Jobs queued or in progress
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Wait until every queued job has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs, drain what is queued, and join the workers
    pub async fn shutdown(&self) {
        drop(self.tx.lock().unwrap_or_else(|e| e.into_inner()).take());
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Thumbnail worker ended abnormally: {}", e);
            }
        }
        debug!("Thumbnail queue stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ThumbnailJob>>>,
    shared: Arc<Shared>,
) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            trace!(worker_id, "Thumbnail worker exiting");
            break;
        };

        let work = Arc::clone(&shared);
        let photo_id = job.photo_id;
        let outcome = tokio::task::spawn_blocking(move || work.run(&job)).await;
        match outcome {
            Ok(Ok(path)) => debug!(worker_id, photo_id, %path, "Thumbnail ready"),
            Ok(Err(e)) => warn!(photo_id, "Thumbnail generation failed: {}", e),
            Err(e) => warn!(photo_id, "Thumbnail task panicked: {}", e),
        }
        shared.finish_one();
    }
}
