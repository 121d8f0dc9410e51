//! Photograph EXIF interpretation.
//!
//! Turns the raw tags from [`exif_parser`](super::exif_parser) into the
//! values a photo page shows, resolving camera and lens strings against the
//! configured gear table.
//!
//! Rules:
//! - Aperture, focal length, shutter speed, ISO and capture time are required.
//! - Fractions must be `integer/integer` with a non-zero denominator.
//! - A make/model pair that is present but not in the gear table is an error;
//!   a pair that is wholly absent leaves the gear unset.
//! - Any location data is [`ExifError::LocationData`]. The caller must treat
//!   it as a hard stop for the whole build, never as a per-image failure.

use super::exif_parser::{RawExif, read_exif};
use crate::config::{Gear, GearTable};
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

/// EXIF timestamp layout: `2023:05:31 18:30:00`.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExifError {
    #[error("no EXIF data found")]
    NotFound,
    #[error("photo has no {0} EXIF field")]
    MissingField(&'static str),
    #[error("cannot parse {field} value {value:?}: {reason}")]
    Fraction {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("cannot parse capture time {0:?}")]
    Timestamp(String),
    #[error("no such gear with make={make:?} and model={model:?}")]
    UnknownGear { make: String, model: String },
    #[error("photo has location data; strip it before publishing")]
    LocationData,
}

impl ExifError {
    /// Errors that must stop the whole build rather than one image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExifError::LocationData)
    }
}

/// Values shown alongside a photograph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exif {
    /// F-number, e.g. `2.8`.
    pub aperture: f64,
    /// Focal length in millimetres.
    pub focal_length: f64,
    pub iso: String,
    /// Exposure time as written by the camera, e.g. `1/250`.
    pub shutter_speed: String,
    pub taken_at: NaiveDateTime,
    pub camera: Option<Gear>,
    pub lens: Option<Gear>,
}

/// Extract and interpret EXIF from image bytes without decoding pixels.
pub fn load_exif(data: &[u8], gear: &GearTable) -> Result<Exif, ExifError> {
    let raw = read_exif(data).ok_or(ExifError::NotFound)?;
    interpret(&raw, gear)
}

/// Interpret raw tags. Location data is checked before anything else.
pub fn interpret(raw: &RawExif, gear: &GearTable) -> Result<Exif, ExifError> {
    if raw.has_location {
        return Err(ExifError::LocationData);
    }

    let camera = find_gear(gear, raw.make.as_deref(), raw.model.as_deref())?;
    let shutter_speed = raw
        .exposure_time
        .as_deref()
        .ok_or(ExifError::MissingField("ExposureTime"))?
        .replace('"', "");
    let aperture = fraction_field(raw.f_number.as_deref(), "FNumber")?;
    let focal_length = fraction_field(raw.focal_length.as_deref(), "FocalLength")?;
    let iso = raw
        .iso
        .ok_or(ExifError::MissingField("ISOSpeedRatings"))?
        .to_string();
    let lens = find_gear(gear, raw.lens_make.as_deref(), raw.lens_model.as_deref())?;

    let stamp = raw
        .date_time_original
        .as_deref()
        .or(raw.date_time.as_deref())
        .ok_or(ExifError::MissingField("DateTime"))?;
    let taken_at = NaiveDateTime::parse_from_str(stamp.trim(), EXIF_DATETIME_FORMAT)
        .map_err(|_| ExifError::Timestamp(stamp.to_string()))?;

    Ok(Exif {
        aperture,
        focal_length,
        iso,
        shutter_speed,
        taken_at,
        camera,
        lens,
    })
}

fn fraction_field(value: Option<&str>, field: &'static str) -> Result<f64, ExifError> {
    let value = value.ok_or(ExifError::MissingField(field))?;
    parse_fraction(value).map_err(|reason| ExifError::Fraction {
        field,
        value: value.to_string(),
        reason,
    })
}

/// Parse an `integer/integer` token such as `"28/10"` into a decimal.
///
/// Surrounding double quotes are ignored. Non-integer parts, a missing
/// slash and a zero denominator are errors.
pub fn parse_fraction(token: &str) -> Result<f64, String> {
    let token = token.replace('"', "");
    let (numerator, denominator) = token
        .trim()
        .split_once('/')
        .ok_or_else(|| "expected numerator/denominator".to_string())?;
    let numerator: i64 = numerator
        .trim()
        .parse()
        .map_err(|e| format!("numerator {numerator:?} is not an integer: {e}"))?;
    let denominator: i64 = denominator
        .trim()
        .parse()
        .map_err(|e| format!("denominator {denominator:?} is not an integer: {e}"))?;
    if denominator == 0 {
        return Err("denominator is zero".to_string());
    }
    Ok(numerator as f64 / denominator as f64)
}

/// Resolve a make/model pair. Absent → `None`; present but unknown → error.
fn find_gear(
    table: &GearTable,
    make: Option<&str>,
    model: Option<&str>,
) -> Result<Option<Gear>, ExifError> {
    let (Some(make), Some(model)) = (make, model) else {
        return Ok(None);
    };
    table
        .find(make, model)
        .cloned()
        .map(Some)
        .ok_or_else(|| ExifError::UnknownGear {
            make: make.trim_matches([' ', '"']).to_string(),
            model: model.trim_matches([' ', '"']).to_string(),
        })
}
