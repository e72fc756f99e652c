// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Thumbnail derivation
//!
//! Thumbnails are JPEGs bounded to a maximum edge, stored as
//! `thumbnails/<photo id>.jpg` under the library root. They are derived data:
//! a missing or stale thumbnail can always be regenerated from the photo.

pub mod queue;

pub use queue::{ThumbnailJob, ThumbnailQueue};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::metadata::{MediaType, Orientation};
use crate::{Result, ShoeboxError};

/// Directory name under the library root
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// Default bound on the longest thumbnail edge
pub const DEFAULT_MAX_DIMENSION: u32 = 256;

const JPEG_QUALITY: u8 = 85;

/// How far into a RAW file to look for an embedded preview
const RAW_PREVIEW_SCAN_BYTES: u64 = 8 * 1024 * 1024;

/// Embedded JPEGs smaller than this are EXIF micro-thumbnails
const MIN_RAW_PREVIEW_BYTES: usize = 2 * 1024;

/// Derives and stores thumbnails for library items
#[derive(Debug, Clone)]
pub struct ThumbnailDeriver {
    dir: PathBuf,
    max_dimension: u32,
}

impl ThumbnailDeriver {
    pub fn new(dir: impl Into<PathBuf>, max_dimension: u32) -> Self {
        Self {
            dir: dir.into(),
            max_dimension: max_dimension.max(1),
        }
    }

    /// Deterministic thumbnail location for a photo
    pub fn thumbnail_path_for(&self, photo_id: i64) -> PathBuf {
        self.dir.join(format!("{}.jpg", photo_id))
    }

    /// Derive the thumbnail for a photo, replacing any previous one
    pub fn derive(
        &self,
        photo_id: i64,
        source: &Path,
        media_type: MediaType,
        orientation: Option<Orientation>,
    ) -> Result<PathBuf> {
        let decoded = self.load(photo_id, source, media_type)?;
        let scaled = self.scale(decoded);
        let oriented = match orientation {
            Some(o) => apply_orientation(scaled, o),
            None => scaled,
        };

        fs::create_dir_all(&self.dir)?;
        let target = self.thumbnail_path_for(photo_id);
        let temp = self
            .dir
            .join(format!(".{}.{}.tmp", photo_id, uuid::Uuid::new_v4().simple()));

        if let Err(e) = write_jpeg(&oriented, &temp) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(photo_id, ?target, "Thumbnail written");
        Ok(target)
    }

    /// Remove a photo's thumbnail; returns whether one existed
    pub fn remove(&self, photo_id: i64) -> Result<bool> {
        match fs::remove_file(self.thumbnail_path_for(photo_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, photo_id: i64, source: &Path, media_type: MediaType) -> Result<DynamicImage> {
        match media_type {
            MediaType::Image if MediaType::is_raw(source) => match image::open(source) {
                // Some TIFF-based RAWs (DNG) decode directly
                Ok(img) => Ok(img),
                Err(_) => raw_preview(source),
            },
            MediaType::Image => Ok(image::open(source)?),
            MediaType::Video => self.video_frame(photo_id, source),
            MediaType::Other => Err(ShoeboxError::Thumbnail(format!(
                "no thumbnail for non-media file {:?}",
                source
            ))),
        }
    }

    fn scale(&self, img: DynamicImage) -> DynamicImage {
        let (w, h) = img.dimensions();
        if w <= self.max_dimension && h <= self.max_dimension {
            img
        } else {
            img.resize(self.max_dimension, self.max_dimension, FilterType::CatmullRom)
        }
    }

    /// Grab one still frame with ffmpeg
    fn video_frame(&self, photo_id: i64, source: &Path) -> Result<DynamicImage> {
        fs::create_dir_all(&self.dir)?;
        let frame = self
            .dir
            .join(format!(".{}.{}.frame.jpg", photo_id, uuid::Uuid::new_v4().simple()));

        let output = Command::new("ffmpeg")
            .args(["-v", "quiet", "-ss", "1", "-i"])
            .arg(source)
            .args(["-vframes", "1", "-q:v", "2", "-y"])
            .arg(&frame)
            .output();

        let grabbed: Result<DynamicImage> = match output {
            Ok(o) if o.status.success() && frame.exists() => image::open(&frame).map_err(Into::into),
            // Clips shorter than the seek offset produce nothing; retry at the start
            Ok(_) => Command::new("ffmpeg")
                .args(["-v", "quiet", "-i"])
                .arg(source)
                .args(["-vframes", "1", "-q:v", "2", "-y"])
                .arg(&frame)
                .output()
                .ok()
                .filter(|o| o.status.success() && frame.exists())
                .ok_or_else(|| ShoeboxError::Thumbnail(format!("ffmpeg could not read {:?}", source)))
                .and_then(|_| image::open(&frame).map_err(Into::into)),
            Err(e) => Err(ShoeboxError::Thumbnail(format!("ffmpeg unavailable: {}", e))),
        };

        let _ = fs::remove_file(&frame);
        grabbed
    }
}

/// Rotate or mirror an image so it displays upright
pub fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90 => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270 => img.rotate270(),
    }
}

fn write_jpeg(img: &DynamicImage, dst: &Path) -> Result<()> {
    let file = File::create(dst)?;
    let mut writer = BufWriter::new(file);
    let rgb = img.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}

/// Decode the largest embedded JPEG preview in a RAW file
fn raw_preview(source: &Path) -> Result<DynamicImage> {
    let mut data = Vec::new();
    File::open(source)?
        .take(RAW_PREVIEW_SCAN_BYTES)
        .read_to_end(&mut data)?;

    let mut candidates = embedded_jpegs(&data);
    candidates.sort_by_key(|slice| std::cmp::Reverse(slice.len()));

    candidates
        .into_iter()
        .filter(|slice| slice.len() >= MIN_RAW_PREVIEW_BYTES)
        .find_map(|slice| image::load_from_memory_with_format(slice, ImageFormat::Jpeg).ok())
        .ok_or_else(|| ShoeboxError::Thumbnail(format!("no usable preview in {:?}", source)))
}

/// Byte ranges that look like complete JPEG streams (SOI .. EOI)
fn embedded_jpegs(data: &[u8]) -> Vec<&[u8]> {
    const SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
    const EOI: [u8; 2] = [0xFF, 0xD9];

    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = data[pos..].windows(3).position(|w| w == SOI) {
        let start = pos + offset;
        match data[start..].windows(2).position(|w| w == EOI) {
            Some(end_offset) => {
                let end = start + end_offset + 2;
                found.push(&data[start..end]);
                pos = end;
            }
            None => break,
        }
        if found.len() >= 8 {
            break;
        }
    }
    found
}
