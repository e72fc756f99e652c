// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Shoebox

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Shoebox operations
pub type Result<T> = std::result::Result<T, ShoeboxError>;

/// Shoebox error types
#[derive(Error, Debug)]
pub enum ShoeboxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Content {digest} is already in the library as photo {existing_id}")]
    DuplicateContent { digest: String, existing_id: i64 },

    #[error("Placement of {path:?} failed: {reason}")]
    Placement { path: PathBuf, reason: String },

    #[error("Corrupt library: {0}")]
    CorruptLibrary(String),

    #[error("Library already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("No library found at {0:?}")]
    NotFound(PathBuf),

    #[error("Library at {0:?} is locked by another session")]
    LibraryLocked(PathBuf),

    #[error("Photo {0} not found")]
    PhotoNotFound(i64),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Library is open read-only")]
    ReadOnly,

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShoeboxError {
    pub(crate) fn placement(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Placement {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
