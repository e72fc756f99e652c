// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Physical placement of media files into the dated library tree
//!
//! Files land in `YYYY/MM/DD/` under the library root. A file is first
//! copied to a hidden temporary name next to its destination, re-hashed,
//! and only then renamed into place. A failed or corrupted copy never leaves
//! anything behind.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::hashing::{compute_fingerprint, Fingerprint};
use crate::{Result, ShoeboxError};

/// Upper bound on candidate names tried for one file
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Byte transport used to write a file into the library
pub trait Transfer: Send + Sync {
    /// Copy `source` to the new file `dest`, returning bytes written
    fn copy(&self, source: &Path, dest: &Path) -> io::Result<u64>;
}

/// Plain file system copy that keeps the source modification time
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTransfer;

impl Transfer for FsTransfer {
    fn copy(&self, source: &Path, dest: &Path) -> io::Result<u64> {
        let written = fs::copy(source, dest)?;
        let modified = fs::metadata(source)?.modified()?;
        OpenOptions::new().write(true).open(dest)?.set_modified(modified)?;
        Ok(written)
    }
}

/// Whether the source file survives an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

/// How to name a file whose name is already taken by different content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// `name_001.ext`, `name_002.ext`, ...
    #[default]
    Counter,
    /// `name_<first 8 hex of digest>.ext`, then a counter
    HashSuffix,
}

/// Where a file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Library-relative path with `/` separators
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// An identical file was already at the destination and was reused
    pub adopted: bool,
}

impl Placement {
    /// Final file name
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Date bucket directory for a day
pub fn bucket_for(date: NaiveDate) -> PathBuf {
    PathBuf::from(bucket_string(date))
}

fn bucket_string(date: NaiveDate) -> String {
    format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
}

/// Read the date bucket back out of a library-relative path
pub fn bucket_of(relative_path: &str) -> Option<NaiveDate> {
    let mut parts = relative_path.split('/');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    parts.next()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

enum Slot {
    Free(PathBuf),
    SameContent(PathBuf),
}

/// Places files into a library tree
#[derive(Clone)]
pub struct Organizer {
    root: PathBuf,
    policy: CollisionPolicy,
    transfer: Arc<dyn Transfer>,
}

impl Organizer {
    pub fn new(root: impl Into<PathBuf>, policy: CollisionPolicy, transfer: Arc<dyn Transfer>) -> Self {
        Self {
            root: root.into(),
            policy,
            transfer,
        }
    }

    /// Organizer using plain file copies
    pub fn with_fs(root: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self::new(root, policy, Arc::new(FsTransfer))
    }

    fn candidate_name(&self, stem: &str, ext: Option<&str>, digest: &Fingerprint, attempt: usize) -> String {
        let base = match (self.policy, attempt) {
            (_, 0) => stem.to_string(),
            (CollisionPolicy::Counter, n) => format!("{}_{:03}", stem, n),
            (CollisionPolicy::HashSuffix, 1) => format!("{}_{}", stem, digest.short()),
            (CollisionPolicy::HashSuffix, n) => format!("{}_{}_{:03}", stem, digest.short(), n - 1),
        };
        match ext {
            Some(ext) => format!("{}.{}", base, ext),
            None => base,
        }
    }

    /// First slot at or after `start` that is free or already holds this content
    fn resolve_slot(
        &self,
        dir: &Path,
        file_name: &Path,
        digest: &Fingerprint,
        start: usize,
    ) -> Result<(usize, Slot)> {
        let stem = file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file_name.extension().map(|e| e.to_string_lossy().into_owned());

        for attempt in start..MAX_NAME_ATTEMPTS {
            let candidate = dir.join(self.candidate_name(&stem, ext.as_deref(), digest, attempt));
            match fs::symlink_metadata(&candidate) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok((attempt, Slot::Free(candidate)));
                }
                Err(e) => return Err(ShoeboxError::placement(&candidate, e.to_string())),
                Ok(meta) if meta.is_file() => {
                    if compute_fingerprint(&candidate).ok().as_ref() == Some(digest) {
                        return Ok((attempt, Slot::SameContent(candidate)));
                    }
                }
                Ok(_) => {}
            }
        }

        Err(ShoeboxError::placement(
            dir.join(file_name),
            "no free file name in bucket",
        ))
    }

    fn placement_for(&self, bucket: &str, path: PathBuf, adopted: bool) -> Placement {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Placement {
            relative_path: format!("{}/{}", bucket, name),
            absolute_path: path,
            adopted,
        }
    }

    /// Place `source` (whose content hashes to `digest`) into the bucket for
    /// `captured_at`.
    pub fn place_file(
        &self,
        source: &Path,
        digest: &Fingerprint,
        captured_at: DateTime<Utc>,
        mode: TransferMode,
    ) -> Result<Placement> {
        let file_name = source
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| ShoeboxError::placement(source, "source has no file name"))?;

        let bucket = bucket_string(captured_at.date_naive());
        let dir = self.root.join(bucket_for(captured_at.date_naive()));
        fs::create_dir_all(&dir).map_err(|e| ShoeboxError::placement(&dir, e.to_string()))?;

        let (start, slot) = self.resolve_slot(&dir, &file_name, digest, 0)?;
        if let Slot::SameContent(existing) = slot {
            debug!(?source, ?existing, "Adopting identical file already in bucket");
            let placement = self.placement_for(&bucket, existing, true);
            if mode == TransferMode::Move {
                remove_source(source);
            }
            return Ok(placement);
        }

        let temp = dir.join(format!(
            ".{}.{}.partial",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = self.write_verified(source, &temp, digest) {
            discard(&temp);
            return Err(e);
        }

        // The name may have been taken while the copy ran
        let (_, slot) = self.resolve_slot(&dir, &file_name, digest, start)?;
        let placement = match slot {
            Slot::Free(dest) => {
                if let Err(e) = fs::rename(&temp, &dest) {
                    discard(&temp);
                    return Err(ShoeboxError::placement(&dest, e.to_string()));
                }
                self.placement_for(&bucket, dest, false)
            }
            Slot::SameContent(existing) => {
                discard(&temp);
                self.placement_for(&bucket, existing, true)
            }
        };

        if mode == TransferMode::Move {
            remove_source(source);
        }

        info!("Placed {:?} at {}", source, placement.relative_path);
        Ok(placement)
    }

    fn write_verified(&self, source: &Path, temp: &Path, digest: &Fingerprint) -> Result<()> {
        self.transfer
            .copy(source, temp)
            .map_err(|e| ShoeboxError::placement(temp, format!("copy failed: {}", e)))?;

        File::open(temp)
            .and_then(|f| f.sync_all())
            .map_err(|e| ShoeboxError::placement(temp, format!("sync failed: {}", e)))?;

        let written = compute_fingerprint(temp)
            .map_err(|e| ShoeboxError::placement(temp, format!("verification read failed: {}", e)))?;
        if &written != digest {
            return Err(ShoeboxError::placement(
                temp,
                format!("verification failed: expected {}, wrote {}", digest.short(), written.short()),
            ));
        }
        Ok(())
    }

    /// Undo a placement whose catalog insert failed. Adopted files belong to
    /// the library already and are left alone.
    pub fn remove_placed(&self, placement: &Placement) -> Result<()> {
        if placement.adopted {
            return Ok(());
        }
        match fs::remove_file(&placement.absolute_path) {
            Ok(()) => {
                debug!(path = %placement.relative_path, "Rolled back placement");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(?temp, "Failed to remove temporary file: {}", e);
        }
    }
}

fn remove_source(source: &Path) {
    if let Err(e) = fs::remove_file(source) {
        warn!(?source, "Placed file but could not remove source: {}", e);
    }
}
