//! Minimal EXIF tag reader for JPEG and TIFF files.
//!
//! Extracts only the tags the photo pages display:
//!
//! | IFD | Tag | Name |
//! |-----|-----|------|
//! | 0 | `0x010F` | Make |
//! | 0 | `0x0110` | Model |
//! | 0 | `0x0132` | DateTime |
//! | 0 | `0x8825` | GPS IFD pointer (presence only) |
//! | Exif | `0x829A` | ExposureTime |
//! | Exif | `0x829D` | FNumber |
//! | Exif | `0x8827` | ISOSpeedRatings |
//! | Exif | `0x9003` | DateTimeOriginal |
//! | Exif | `0x920A` | FocalLength |
//! | Exif | `0xA433` | LensMake |
//! | Exif | `0xA434` | LensModel |
//!
//! For JPEG: reads the APP1 segment starting with `Exif\0\0`.
//! For TIFF: the file itself is the TIFF structure.
//!
//! Only tag values are decoded here; interpretation (fractions, gear
//! lookup, the location-data stop) lives in [`super::exif`].

const EXIF_HEADER: &[u8] = b"Exif\0\0";

pub(crate) const TAG_MAKE: u16 = 0x010F;
pub(crate) const TAG_MODEL: u16 = 0x0110;
pub(crate) const TAG_DATE_TIME: u16 = 0x0132;
pub(crate) const TAG_EXIF_IFD: u16 = 0x8769;
pub(crate) const TAG_GPS_IFD: u16 = 0x8825;
pub(crate) const TAG_EXPOSURE_TIME: u16 = 0x829A;
pub(crate) const TAG_F_NUMBER: u16 = 0x829D;
pub(crate) const TAG_ISO: u16 = 0x8827;
pub(crate) const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub(crate) const TAG_FOCAL_LENGTH: u16 = 0x920A;
pub(crate) const TAG_LENS_MAKE: u16 = 0xA433;
pub(crate) const TAG_LENS_MODEL: u16 = 0xA434;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

/// Raw EXIF tag values, as strings where the tag is textual or rational.
///
/// Rationals are kept as `numerator/denominator` tokens so the caller
/// decides how to interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExif {
    pub make: Option<String>,
    pub model: Option<String>,
    pub date_time: Option<String>,
    pub date_time_original: Option<String>,
    pub exposure_time: Option<String>,
    pub f_number: Option<String>,
    pub focal_length: Option<String>,
    pub iso: Option<u32>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    /// The image carries a GPS IFD.
    pub has_location: bool,
}

/// Read EXIF tags from image bytes, sniffing JPEG or TIFF by magic number.
///
/// Returns `None` when the bytes carry no recognisable EXIF block.
pub fn read_exif(data: &[u8]) -> Option<RawExif> {
    if data.starts_with(&[0xFF, 0xD8]) {
        let tiff = find_jpeg_app1_exif(data)?;
        read_exif_from_tiff(tiff)
    } else if data.starts_with(b"II") || data.starts_with(b"MM") {
        read_exif_from_tiff(data)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JPEG: locate the APP1 Exif segment
// ---------------------------------------------------------------------------

/// Find the TIFF bytes inside a JPEG's APP1 Exif segment.
fn find_jpeg_app1_exif(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 2; // past SOI
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // SOS (0xDA) means image data starts; EOI ends the file
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        // Fill bytes and markers without a length field
        if marker == 0xFF || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += if marker == 0xFF { 1 } else { 2 };
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + seg_len).min(data.len());
        if marker == 0xE1 && seg_start <= seg_end {
            let segment = &data[seg_start..seg_end];
            if let Some(tiff) = segment.strip_prefix(EXIF_HEADER) {
                return Some(tiff);
            }
        }
        pos += 2 + seg_len;
    }
    None
}

// ---------------------------------------------------------------------------
// TIFF: walk IFD0 and the Exif sub-IFD
// ---------------------------------------------------------------------------

/// Byte-order aware, bounds-checked view of a TIFF structure.
struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

/// One 12-byte IFD entry.
struct Entry {
    tag: u16,
    typ: u16,
    count: usize,
    /// Offset of the entry's 4-byte value field.
    field: usize,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let tiff = Self { data, big_endian };
        // Verify TIFF magic (42)
        (tiff.read_u16(2)? == 42).then_some(tiff)
    }

    fn read_u16(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn read_u32(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Entries of the IFD at `offset`. Truncated IFDs yield what fits.
    fn entries(&self, offset: usize) -> Vec<Entry> {
        let Some(count) = self.read_u16(offset) else {
            return Vec::new();
        };
        (0..count as usize)
            .map_while(|i| {
                let at = offset + 2 + i * 12;
                Some(Entry {
                    tag: self.read_u16(at)?,
                    typ: self.read_u16(at + 2)?,
                    count: self.read_u32(at + 4)? as usize,
                    field: at + 8,
                })
            })
            .collect()
    }

    /// The bytes of an entry's value, inline or at its offset.
    fn value_bytes(&self, entry: &Entry) -> Option<&'a [u8]> {
        let byte_len = entry.count.checked_mul(type_size(entry.typ))?;
        let start = if byte_len <= 4 {
            entry.field
        } else {
            self.read_u32(entry.field)? as usize
        };
        self.data.get(start..start.checked_add(byte_len)?)
    }

    fn ascii(&self, entry: &Entry) -> Option<String> {
        let bytes = self.value_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let value = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
        (!value.is_empty()).then_some(value)
    }

    fn rational(&self, entry: &Entry) -> Option<String> {
        if entry.typ != TYPE_RATIONAL || entry.count == 0 {
            return None;
        }
        let offset = self.read_u32(entry.field)? as usize;
        let numerator = self.read_u32(offset)?;
        let denominator = self.read_u32(offset + 4)?;
        Some(format!("{numerator}/{denominator}"))
    }

    fn integer(&self, entry: &Entry) -> Option<u32> {
        match entry.typ {
            TYPE_SHORT => self.read_u16(entry.field).map(u32::from),
            TYPE_LONG => self.read_u32(entry.field),
            _ => None,
        }
    }
}

/// TIFF type sizes: count is number of values, not bytes.
fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

fn read_exif_from_tiff(data: &[u8]) -> Option<RawExif> {
    let tiff = Tiff::new(data)?;
    let ifd0 = tiff.read_u32(4)? as usize;
    let mut result = RawExif::default();
    let mut exif_ifd = None;

    for entry in tiff.entries(ifd0) {
        match entry.tag {
            TAG_MAKE => result.make = tiff.ascii(&entry),
            TAG_MODEL => result.model = tiff.ascii(&entry),
            TAG_DATE_TIME => result.date_time = tiff.ascii(&entry),
            TAG_EXIF_IFD => exif_ifd = tiff.integer(&entry),
            TAG_GPS_IFD => result.has_location = true,
            _ => {}
        }
    }

    if let Some(offset) = exif_ifd {
        for entry in tiff.entries(offset as usize) {
            match entry.tag {
                TAG_EXPOSURE_TIME => result.exposure_time = tiff.rational(&entry),
                TAG_F_NUMBER => result.f_number = tiff.rational(&entry),
                TAG_ISO => result.iso = tiff.integer(&entry),
                TAG_DATE_TIME_ORIGINAL => result.date_time_original = tiff.ascii(&entry),
                TAG_FOCAL_LENGTH => result.focal_length = tiff.rational(&entry),
                TAG_LENS_MAKE => result.lens_make = tiff.ascii(&entry),
                TAG_LENS_MODEL => result.lens_model = tiff.ascii(&entry),
                // Some writers put the GPS pointer here
                TAG_GPS_IFD => result.has_location = true,
                _ => {}
            }
        }
    }

    Some(result)
}
