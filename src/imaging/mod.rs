//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **EXIF** | custom parser (JPEG APP1 + TIFF IFD) |
//! | **Resize** | Lanczos3 via `image` |
//! | **Encode → WebP** | `image::codecs::webp` (lossless) |
//!
//! The module is split into:
//! - **Calculations**: pure functions for thumbnail sizes (unit testable)
//! - **EXIF**: tag reader plus interpretation against the gear table
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Asset**: [`ImageAsset`], the photograph as a publishable document

mod asset;
pub mod backend;
mod calculations;
mod exif;
pub(crate) mod exif_parser;
pub mod rust_backend;

pub use asset::{ImageAsset, ImageError, ImagePipeline, image_web_path};
pub use backend::{BackendError, ImageBackend};
pub use calculations::{THUMBNAIL_DIR, Thumbnail, plan_thumbnails, thumbnail_sizes};
pub use exif::{Exif, ExifError, load_exif, parse_fraction};
pub use rust_backend::{PHOTO_EXTENSIONS, RustBackend};
