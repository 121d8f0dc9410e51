//! Shared test utilities for the sleet test suite.
//!
//! Provides synthetic photographs (real JPEG bytes with a crafted EXIF APP1
//! segment), a gear table that matches them, an in-memory source reader and
//! a project layout on disk.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let jpeg = photo_jpeg(64, 48);
//! let exif = load_exif(&jpeg, &sample_gear_table()).unwrap();
//! assert_eq!(exif.iso, "400");
//! ```

use crate::config::{Gear, GearExif, GearTable, SiteConfig};
use crate::imaging::exif_parser::{
    RawExif, TAG_DATE_TIME, TAG_DATE_TIME_ORIGINAL, TAG_EXIF_IFD, TAG_EXPOSURE_TIME,
    TAG_F_NUMBER, TAG_FOCAL_LENGTH, TAG_GPS_IFD, TAG_ISO, TAG_LENS_MAKE, TAG_LENS_MODEL,
    TAG_MAKE, TAG_MODEL,
};
use crate::scan::SourceReader;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

// =========================================================================
// EXIF construction
// =========================================================================

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

#[derive(Debug, Clone)]
enum Value {
    Ascii(String),
    Short(u16),
    Long(u32),
    Rational(u32, u32),
}

/// Builds a TIFF structure holding IFD0 and an Exif sub-IFD.
#[derive(Debug, Clone, Default)]
pub struct ExifBuilder {
    ifd0: Vec<(u16, Value)>,
    exif: Vec<(u16, Value)>,
    big_endian: bool,
    gps: bool,
}

impl ExifBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        self.ifd0.push((tag, Value::Ascii(value.to_string())));
        self
    }

    pub fn exif_ascii(mut self, tag: u16, value: &str) -> Self {
        self.exif.push((tag, Value::Ascii(value.to_string())));
        self
    }

    pub fn exif_rational(mut self, tag: u16, numerator: u32, denominator: u32) -> Self {
        self.exif.push((tag, Value::Rational(numerator, denominator)));
        self
    }

    pub fn exif_short(mut self, tag: u16, value: u16) -> Self {
        self.exif.push((tag, Value::Short(value)));
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Add a GPS IFD pointer, as a phone camera would.
    pub fn with_gps(mut self) -> Self {
        self.gps = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let ifd_len = |entries: usize| 2 + entries * 12 + 4;
        let ifd0_entries = self.ifd0.len() + usize::from(!self.exif.is_empty()) + usize::from(self.gps);
        let exif_at = 8 + ifd_len(ifd0_entries);
        let data_at = exif_at + if self.exif.is_empty() { 0 } else { ifd_len(self.exif.len()) };

        let mut w = TiffWriter {
            big_endian: self.big_endian,
            out: Vec::new(),
            data: Vec::new(),
            data_at,
        };

        w.out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        w.u16(42);
        w.u32(8);

        let mut ifd0 = self.ifd0.clone();
        if !self.exif.is_empty() {
            ifd0.push((TAG_EXIF_IFD, Value::Long(exif_at as u32)));
        }
        if self.gps {
            // An empty GPS IFD: no entries, no next IFD
            let gps_at = w.reserve(&[0; 6]);
            ifd0.push((TAG_GPS_IFD, Value::Long(gps_at)));
        }
        w.ifd(&ifd0);
        if !self.exif.is_empty() {
            w.ifd(&self.exif);
        }

        let TiffWriter { mut out, data, .. } = w;
        out.extend_from_slice(&data);
        out
    }
}

struct TiffWriter {
    big_endian: bool,
    out: Vec<u8>,
    /// Out-of-line values, appended after every IFD.
    data: Vec<u8>,
    data_at: usize,
}

impl TiffWriter {
    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u16(&mut self, v: u16) {
        let b = self.u16_bytes(v);
        self.out.extend_from_slice(&b);
    }

    fn u32(&mut self, v: u32) {
        let b = self.u32_bytes(v);
        self.out.extend_from_slice(&b);
    }

    /// Append bytes to the data area, returning their absolute offset.
    fn reserve(&mut self, bytes: &[u8]) -> u32 {
        let at = (self.data_at + self.data.len()) as u32;
        self.data.extend_from_slice(bytes);
        if self.data.len() % 2 == 1 {
            self.data.push(0);
        }
        at
    }

    fn ifd(&mut self, entries: &[(u16, Value)]) {
        self.u16(entries.len() as u16);
        for (tag, value) in entries {
            let (typ, count, bytes) = match value {
                Value::Ascii(s) => {
                    let mut b = s.as_bytes().to_vec();
                    b.push(0);
                    (TYPE_ASCII, b.len(), b)
                }
                Value::Short(v) => (TYPE_SHORT, 1, self.u16_bytes(*v).to_vec()),
                Value::Long(v) => (TYPE_LONG, 1, self.u32_bytes(*v).to_vec()),
                Value::Rational(n, d) => {
                    let mut b = self.u32_bytes(*n).to_vec();
                    b.extend_from_slice(&self.u32_bytes(*d));
                    (TYPE_RATIONAL, 1, b)
                }
            };
            self.u16(*tag);
            self.u16(typ);
            self.u32(count as u32);
            if bytes.len() <= 4 {
                let mut field = bytes;
                field.resize(4, 0);
                self.out.extend_from_slice(&field);
            } else {
                let at = self.reserve(&bytes);
                self.u32(at);
            }
        }
        self.u32(0);
    }
}

/// EXIF for the sample photograph: a Canon body and lens from
/// [`sample_gear_table`], shot on 2023-05-31.
pub fn sample_exif() -> ExifBuilder {
    ExifBuilder::new()
        .ascii(TAG_MAKE, "Canon")
        .ascii(TAG_MODEL, "Canon EOS Rebel T7")
        .ascii(TAG_DATE_TIME, "2023:06:01 10:00:00")
        .exif_rational(TAG_EXPOSURE_TIME, 1, 250)
        .exif_rational(TAG_F_NUMBER, 28, 10)
        .exif_short(TAG_ISO, 400)
        .exif_ascii(TAG_DATE_TIME_ORIGINAL, "2023:05:31 18:30:00")
        .exif_rational(TAG_FOCAL_LENGTH, 50, 1)
        .exif_ascii(TAG_LENS_MAKE, "Canon")
        .exif_ascii(TAG_LENS_MODEL, "EF50mm f/1.8 STM")
}

/// The tags [`sample_exif`] writes, as the parser reports them.
pub fn complete_raw_exif() -> RawExif {
    RawExif {
        make: Some("Canon".to_string()),
        model: Some("Canon EOS Rebel T7".to_string()),
        date_time: Some("2023:06:01 10:00:00".to_string()),
        date_time_original: Some("2023:05:31 18:30:00".to_string()),
        exposure_time: Some("1/250".to_string()),
        f_number: Some("28/10".to_string()),
        focal_length: Some("50/1".to_string()),
        iso: Some(400),
        lens_make: Some("Canon".to_string()),
        lens_model: Some("EF50mm f/1.8 STM".to_string()),
        has_location: false,
    }
}

pub fn sample_gear_table() -> GearTable {
    GearTable::new(sample_gear())
}

pub fn sample_gear() -> Vec<Gear> {
    vec![
        Gear {
            make: "Canon".to_string(),
            model: "EOS Rebel T7".to_string(),
            link: "https://example.com/gear/rebel-t7".to_string(),
            exif: GearExif {
                make: "Canon".to_string(),
                model: "Canon EOS Rebel T7".to_string(),
            },
        },
        Gear {
            make: "Canon".to_string(),
            model: "EF 50mm f/1.8 STM".to_string(),
            link: "https://example.com/gear/ef-50".to_string(),
            exif: GearExif {
                make: "Canon".to_string(),
                model: "EF50mm f/1.8 STM".to_string(),
            },
        },
    ]
}

// =========================================================================
// JPEG construction
// =========================================================================

/// A real, decodable JPEG with no metadata segments.
pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

/// A JPEG with `tiff` in an APP1 `Exif` segment right after SOI.
pub fn jpeg_with_exif(width: u32, height: u32, tiff: &[u8]) -> Vec<u8> {
    let jpeg = plain_jpeg(width, height);
    let payload_len = 2 + 6 + tiff.len();
    let mut out = Vec::with_capacity(jpeg.len() + payload_len + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(payload_len as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A publishable photograph: sample EXIF, no location.
pub fn photo_jpeg(width: u32, height: u32) -> Vec<u8> {
    jpeg_with_exif(width, height, &sample_exif().build())
}

/// A photograph that must never be published.
pub fn located_photo_jpeg(width: u32, height: u32) -> Vec<u8> {
    jpeg_with_exif(width, height, &sample_exif().with_gps().build())
}

// =========================================================================
// Sources
// =========================================================================

/// Sources served from memory, keyed by project-relative path.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), content.into());
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

// =========================================================================
// Projects on disk
// =========================================================================

/// A valid configuration with the sample gear and default paths.
pub fn sample_config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.production.url = "https://example.com/".to_string();
    config.gear = sample_gear();
    config
}

/// Write text `files` (project-relative path, content) under a fresh temp dir.
pub fn project_with(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (path, content) in files {
        write_file(tmp.path(), path, content.as_bytes());
    }
    tmp
}

/// Write `content` at `root/path`, creating parent directories.
pub fn write_file(root: &Path, path: &str, content: &[u8]) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, content).unwrap();
}
