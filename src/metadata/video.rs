// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Video container metadata via FFprobe
//!
//! FFprobe is optional. When it is missing or cannot parse the file, the
//! result is simply empty metadata.

use chrono::{DateTime, Local, Utc};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{CaptureSource, GpsCoordinate, Metadata};

/// Parsed subset of `ffprobe -show_format -show_streams`
#[derive(Debug, Default)]
struct VideoProbe {
    creation_time: Option<DateTime<Utc>>,
    duration_secs: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    codec: Option<String>,
    make: Option<String>,
    model: Option<String>,
    location: Option<String>,
}

/// Check if FFprobe is available
pub fn ffprobe_available() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_ffprobe(path: &Path) -> Option<serde_json::Value> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    serde_json::from_slice(&output.stdout).ok()
}

fn parse_probe(json: &serde_json::Value) -> Option<VideoProbe> {
    let format = json.get("format")?;
    let tags = format.get("tags");
    let tag = |name: &str| {
        tags.and_then(|t| t.get(name))
            .and_then(|v| v.as_str())
            .map(String::from)
    };

    let mut probe = VideoProbe {
        duration_secs: format
            .get("duration")
            .and_then(|d| d.as_str())
            .and_then(|d| d.parse::<f64>().ok()),
        make: tag("com.apple.quicktime.make"),
        model: tag("com.apple.quicktime.model"),
        location: tag("com.apple.quicktime.location.ISO6709").or_else(|| tag("location")),
        ..Default::default()
    };

    // QuickTime creationdate keeps the local offset; prefer it over the UTC tag
    probe.creation_time = tag("com.apple.quicktime.creationdate")
        .or_else(|| tag("creation_time"))
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Local).naive_local().and_utc());

    if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
        if let Some(video) = streams
            .iter()
            .find(|s| s.get("codec_type").and_then(|t| t.as_str()) == Some("video"))
        {
            probe.width = video.get("width").and_then(|w| w.as_u64()).map(|w| w as u32);
            probe.height = video.get("height").and_then(|h| h.as_u64()).map(|h| h as u32);
            probe.codec = video.get("codec_name").and_then(|c| c.as_str()).map(String::from);
        }
    }

    Some(probe)
}

/// Parse an ISO 6709 location string such as `+37.7858-122.4064+012.000/`
fn parse_iso6709(raw: &str) -> Option<GpsCoordinate> {
    let body = raw.trim().trim_end_matches('/');
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in body.char_indices().skip(1) {
        if c == '+' || c == '-' {
            parts.push(&body[start..i]);
            start = i;
        }
    }
    parts.push(&body[start..]);

    let latitude: f64 = parts.first()?.parse().ok()?;
    let longitude: f64 = parts.get(1)?.parse().ok()?;
    let altitude = parts.get(2).and_then(|a| a.parse().ok());
    Some(GpsCoordinate {
        latitude,
        longitude,
        altitude,
    })
}

fn probe_to_metadata(probe: VideoProbe) -> Metadata {
    let mut metadata = Metadata::default();

    if let Some(ts) = probe.creation_time {
        metadata.captured_at = Some(ts);
        metadata.captured_at_source = Some(CaptureSource::Embedded);
    }
    if let (Some(w), Some(h)) = (probe.width, probe.height) {
        metadata.dimensions = Some((w, h));
    }
    metadata.camera = match (probe.make, probe.model) {
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (make, model) => make.or(model),
    };
    if let Some(location) = &probe.location {
        metadata.gps = parse_iso6709(location);
        metadata.raw.insert("location".into(), location.clone());
    }
    if let Some(codec) = probe.codec {
        metadata.raw.insert("codec".into(), codec);
    }
    if let Some(duration) = probe.duration_secs {
        metadata.raw.insert("duration_secs".into(), format!("{:.3}", duration));
    }

    metadata
}

/// Read container metadata for a video file
pub fn read_video_metadata(path: &Path) -> Metadata {
    match run_ffprobe(path).as_ref().and_then(parse_probe) {
        Some(probe) => probe_to_metadata(probe),
        None => {
            debug!(?path, "No video metadata (ffprobe missing or failed)");
            Metadata::default()
        }
    }
}
