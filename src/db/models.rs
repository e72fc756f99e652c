// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Catalog row types and query parameters

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::hashing::Fingerprint;
use crate::metadata::{MediaType, Metadata};

/// A cataloged photo or video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub filename: String,
    pub original_path: String,
    /// Library-relative path of the stored file
    pub path: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub captured_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
    pub media_type: MediaType,
    pub metadata: Option<serde_json::Value>,
    pub thumbnail_path: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PhotoRecord {
    /// Typed view of the stored metadata blob
    pub fn parsed_metadata(&self) -> Option<Metadata> {
        self.metadata.as_ref().and_then(Metadata::from_json)
    }

    /// Timestamp that decides the record's date bucket
    pub fn bucket_time(&self) -> DateTime<Utc> {
        self.captured_at.unwrap_or(self.imported_at)
    }
}

/// Everything needed to insert a new photo row
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub filename: String,
    pub original_path: String,
    pub path: String,
    pub content_hash: Fingerprint,
    pub size_bytes: u64,
    pub captured_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
    pub media_type: MediaType,
    pub metadata: Option<serde_json::Value>,
}

/// Which rows a listing includes by deletion state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionState {
    #[default]
    Active,
    Deleted,
    All,
}

/// Listing filter. Dates are inclusive and match against the capture date,
/// or the import date for rows without a capture time.
#[derive(Debug, Clone, Default)]
pub struct PhotoFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub media_type: Option<MediaType>,
    pub deletion: DeletionState,
    pub filename_contains: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PhotoFilter {
    /// Active photos only, no other constraint
    pub fn active() -> Self {
        Self::default()
    }

    pub fn with_deletion(mut self, deletion: DeletionState) -> Self {
        self.deletion = deletion;
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    CapturedDesc,
    CapturedAsc,
    ImportedDesc,
    ImportedAsc,
}

impl SortOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            Self::CapturedDesc => "COALESCE(created_at, imported_at) DESC, id DESC",
            Self::CapturedAsc => "COALESCE(created_at, imported_at) ASC, id ASC",
            Self::ImportedDesc => "imported_at DESC, id DESC",
            Self::ImportedAsc => "imported_at ASC, id ASC",
        }
    }
}

/// A key/value setting stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Catalog statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub active: i64,
    pub deleted: i64,
    pub total_bytes: u64,
    pub by_media_type: BTreeMap<String, i64>,
    pub latest_import: Option<DateTime<Utc>>,
    pub oldest_capture: Option<DateTime<Utc>>,
    pub missing_thumbnails: i64,
}
