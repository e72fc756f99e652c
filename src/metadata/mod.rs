// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Capture metadata extraction
//!
//! Extraction never fails: a file without embedded metadata yields an empty
//! [`Metadata`], and a malformed metadata block degrades to absent fields plus
//! a recorded warning.

pub mod exif_reader;
pub mod video;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::ShoeboxError;

/// Broad media classification of a library item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp", "heic", "heif",
];

const RAW_EXTENSIONS: &[&str] = &[
    "raw", "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "raf",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "m4v", "3gp", "mts", "webm",
];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl MediaType {
    /// Classify a file by its extension
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            Some(ext) if RAW_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Self::Video,
            _ => Self::Other,
        }
    }

    /// Whether the file is a camera RAW (metadata only, no sensor decoding)
    pub fn is_raw(path: &Path) -> bool {
        extension_of(path)
            .map(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ShoeboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "other" => Ok(Self::Other),
            other => Err(ShoeboxError::UnsupportedFileType(other.to_string())),
        }
    }
}

/// EXIF orientation (tag 0x0112)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn to_exif(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// Whether displaying the image swaps width and height
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }
}

/// Signed decimal-degree position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// Where a record's capture time came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Embedded,
    FileModified,
    Imported,
}

/// Extracted capture metadata.
///
/// The typed fields are the ones the library depends on; everything the
/// readers saw is kept verbatim in `raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at_source: Option<CaptureSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    /// True when nothing at all was found
    pub fn is_empty(&self) -> bool {
        self.captured_at.is_none()
            && self.orientation.is_none()
            && self.camera.is_none()
            && self.gps.is_none()
            && self.dimensions.is_none()
            && self.raw.is_empty()
    }

    /// Record a non-fatal metadata parse problem
    pub(crate) fn warn(&mut self, path: &Path, message: impl Into<String>) {
        let message = message.into();
        warn!(?path, "Metadata parse warning: {}", message);
        self.warnings.push(message);
    }

    /// Width and height as the photo is displayed, after orientation
    pub fn display_dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.dimensions?;
        match self.orientation {
            Some(o) if o.swaps_dimensions() => Some((h, w)),
            _ => Some((w, h)),
        }
    }

    /// Parse a stored metadata blob; unreadable blobs yield `None`
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Extract metadata for a file of the given media type. Never fails.
pub fn extract(path: &Path, media_type: MediaType) -> Metadata {
    let metadata = match media_type {
        MediaType::Image => exif_reader::read_image_metadata(path),
        MediaType::Video => video::read_video_metadata(path),
        MediaType::Other => Metadata::default(),
    };
    debug!(
        ?path,
        captured_at = ?metadata.captured_at,
        camera = ?metadata.camera,
        warnings = metadata.warnings.len(),
        "Extracted metadata"
    );
    metadata
}

/// File modification time as a wall-clock timestamp
pub fn file_modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(wall_clock(DateTime::<Local>::from(modified)))
}

/// Current wall-clock time, in the same convention as capture times
pub fn wall_clock_now() -> DateTime<Utc> {
    wall_clock(Local::now())
}

/// Capture times are stored as local wall-clock time tagged UTC, matching
/// EXIF timestamps which carry no zone. Date buckets read the date directly.
fn wall_clock(local: DateTime<Local>) -> DateTime<Utc> {
    local.naive_local().and_utc()
}
