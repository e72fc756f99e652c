// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! EXIF reader for still images

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

use super::{CaptureSource, GpsCoordinate, Metadata, Orientation};

/// Containers the EXIF reader understands (TIFF-based RAWs included)
const EXIF_CONTAINERS: &[&str] = &[
    "jpg", "jpeg", "tif", "tiff", "heic", "heif", "dng", "nef", "cr2",
    "arw", "orf", "raw",
];

fn has_exif_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXIF_CONTAINERS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read EXIF and header dimensions from an image file
pub fn read_image_metadata(path: &Path) -> Metadata {
    let mut metadata = Metadata::default();

    if let Ok((w, h)) = image::image_dimensions(path) {
        metadata.dimensions = Some((w, h));
    }

    if !has_exif_container(path) {
        return metadata;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            metadata.warn(path, format!("cannot open for EXIF parsing: {}", e));
            return metadata;
        }
    };

    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => apply_exif(&exif, &mut metadata),
        Err(exif::Error::NotFound(_)) => {
            trace!(?path, "No EXIF segment");
        }
        Err(e) => {
            metadata.warn(path, format!("malformed EXIF: {}", e));
        }
    }

    metadata
}

fn apply_exif(exif: &Exif, metadata: &mut Metadata) {
    for field in exif.fields() {
        let key = format!("{:?}.{:?}", field.ifd_num, field.tag);
        metadata
            .raw
            .insert(key, field.display_value().with_unit(exif).to_string());
    }

    metadata.captured_at = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| parse_exif_datetime(&field.value));
    if metadata.captured_at.is_some() {
        metadata.captured_at_source = Some(CaptureSource::Embedded);
    }

    metadata.orientation = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .and_then(Orientation::from_exif);

    let make = exif.get_field(Tag::Make, In::PRIMARY).and_then(|f| exif_string(&f.value));
    let model = exif.get_field(Tag::Model, In::PRIMARY).and_then(|f| exif_string(&f.value));
    metadata.camera = match (make, model) {
        // Many vendors already repeat the make inside the model string
        (Some(make), Some(model)) if model.starts_with(&make) => Some(model),
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (Some(make), None) => Some(make),
        (None, Some(model)) => Some(model),
        (None, None) => None,
    };

    metadata.gps = read_gps(exif);
}

fn read_gps(exif: &Exif) -> Option<GpsCoordinate> {
    let get = |tag| exif.get_field(tag, In::PRIMARY);

    let latitude = dms_to_degrees(get(Tag::GPSLatitude)?)?;
    let longitude = dms_to_degrees(get(Tag::GPSLongitude)?)?;
    let lat_ref = get(Tag::GPSLatitudeRef).and_then(|f| exif_string(&f.value));
    let lon_ref = get(Tag::GPSLongitudeRef).and_then(|f| exif_string(&f.value));

    let altitude = get(Tag::GPSAltitude).and_then(|f| rational_value(&f.value)).map(|alt| {
        // Ref 1 means below sea level
        let below = get(Tag::GPSAltitudeRef)
            .and_then(|f| f.value.get_uint(0))
            .map(|v| v == 1)
            .unwrap_or(false);
        if below { -alt } else { alt }
    });

    Some(GpsCoordinate {
        latitude: apply_ref(latitude, lat_ref.as_deref(), 'S'),
        longitude: apply_ref(longitude, lon_ref.as_deref(), 'W'),
        altitude,
    })
}

fn apply_ref(value: f64, reference: Option<&str>, negative: char) -> f64 {
    match reference {
        Some(r) if r.trim().starts_with(negative) => -value,
        _ => value,
    }
}

fn dms_to_degrees(field: &Field) -> Option<f64> {
    match &field.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            let deg = parts[0].to_f64();
            let min = parts[1].to_f64();
            let sec = parts[2].to_f64();
            let total = deg + min / 60.0 + sec / 3600.0;
            total.is_finite().then_some(total)
        }
        _ => None,
    }
}

fn exif_string(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(values) => values
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .map(|s| s.trim_matches('\u{0}').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational_value(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(values) if !values.is_empty() => Some(values[0].to_f64()),
        Value::SRational(values) if !values.is_empty() => Some(values[0].to_f64()),
        _ => None,
    }
}

fn parse_exif_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let raw = exif_string(value)?;
    parse_exif_timestamp(&raw)
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp as wall-clock time
pub(crate) fn parse_exif_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
