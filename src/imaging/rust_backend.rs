//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, TIFF) | `image::load_from_memory` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | EXIF | custom `exif_parser` (JPEG APP1 + TIFF IFD) |

use super::backend::{BackendError, ImageBackend};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::io::{Cursor, Write};

/// Source extensions the pipeline treats as photographs.
///
/// Only formats that carry EXIF; other images are published as static files.
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff"];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8]) -> Result<(u32, u32), BackendError> {
        image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(data).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode_webp(&self, image: &DynamicImage, out: &mut dyn Write) -> Result<(), BackendError> {
        let rgba = image.to_rgba8();
        WebPEncoder::new_lossless(out)
            .write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BackendError::Encode(e.to_string()))
    }
}
