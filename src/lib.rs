// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shoebox: Local Photo Library Manager
//!
//! Ingests photos and videos into a deduplicated library laid out by capture
//! date, with a SQLite catalog, EXIF metadata and background thumbnails.

pub mod config;
pub mod db;
pub mod error;
pub mod hashing;
pub mod import;
pub mod metadata;
pub mod organizer;
pub mod session;
pub mod thumbnails;

pub use config::AppConfig;
pub use db::{Catalog, PhotoFilter, PhotoRecord, SortOrder};
pub use error::{Result, ShoeboxError};
pub use hashing::Fingerprint;
pub use import::{ImportControl, ImportOptions, ImportStatus, ImportSummary};
pub use metadata::{MediaType, Metadata};
pub use session::{IntegrityReport, LibrarySession};
