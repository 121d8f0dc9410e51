//! Pure calculation functions for thumbnail planning.
//!
//! All functions here are pure and testable without any I/O or images.

use serde::Serialize;

/// Directory segment inserted between an image's web directory and its thumbnails.
pub const THUMBNAIL_DIR: &str = "thumbnails";

/// One planned thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// Destination relative to dist, forward-slash separated.
    pub web_path: String,
}

/// Thumbnail sizes for a source of `width` x `height`.
///
/// Widths are powers of two starting at 1, strictly below the source width.
/// Each height follows from the source aspect ratio, rounded half up; steps
/// whose height rounds to zero are skipped.
///
/// # Examples
/// ```
/// # use sleet::imaging::thumbnail_sizes;
/// // 500x500 → 1x1, 2x2, ... 256x256
/// assert_eq!(thumbnail_sizes(500, 500).len(), 9);
/// assert_eq!(thumbnail_sizes(500, 500)[8], (256, 256));
///
/// // 16:9 landscape
/// assert_eq!(thumbnail_sizes(1600, 900)[10], (1024, 576));
/// ```
pub fn thumbnail_sizes(width: u32, height: u32) -> Vec<(u32, u32)> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut sizes = Vec::new();
    let mut w: u32 = 1;
    while w < width {
        let h = (u64::from(w) * u64::from(height) * 2 + u64::from(width)) / (u64::from(width) * 2);
        if h > 0 {
            sizes.push((w, h as u32));
        }
        match w.checked_mul(2) {
            Some(next) => w = next,
            None => break,
        }
    }
    sizes
}

/// Plan thumbnails for the image published at `web_path`.
///
/// Each lands in a `thumbnails` directory beside the image, named
/// `<stem>.<w>x<h>.webp` where `stem` is the source base name without
/// its extension.
pub fn plan_thumbnails(web_path: &str, source_stem: &str, width: u32, height: u32) -> Vec<Thumbnail> {
    let dir = match web_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{THUMBNAIL_DIR}"),
        None => THUMBNAIL_DIR.to_string(),
    };
    thumbnail_sizes(width, height)
        .into_iter()
        .map(|(w, h)| Thumbnail {
            width: w,
            height: h,
            web_path: format!("{dir}/{source_stem}.{w}x{h}.webp"),
        })
        .collect()
}
