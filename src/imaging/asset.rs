//! Photographs as documents.
//!
//! An [`ImageAsset`] publishes one WebP at its nested web path plus a set
//! of power-of-two thumbnails beside it:
//!
//! ```text
//! src/img/2023/dawn.jpg  →  dist/img/2023/dawn.webp
//!                           dist/img/2023/thumbnails/dawn.1x1.webp
//!                           dist/img/2023/thumbnails/dawn.2x1.webp
//!                           ...
//! ```
//!
//! ## Lifecycle
//!
//! 1. **load**: read EXIF (never pixels), hash the source bytes, read the
//!    dimensions from the header and plan thumbnails. Any EXIF problem
//!    fails the image before anything is written.
//! 2. **publish**: if the stored hash for this base name matches and the
//!    primary and every thumbnail exist, nothing is touched. Otherwise decode once,
//!    encode the primary, encode every thumbnail in parallel, then persist
//!    the new hash.
//!
//! The decoded pixel buffer lives only for the duration of one publish.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{Thumbnail, plan_thumbnails};
use super::exif::{Exif, ExifError, load_exif};
use crate::cache::{HashStore, fnv1_32};
use crate::config::GearTable;
use crate::document::{Document, DocumentError, Freshness, Published, clean_path, is_own_source, write_output};
use crate::metadata::{Kind, Metadata};
use image::DynamicImage;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Exif(#[from] ExifError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("image hash cache: {0}")]
    Cache(#[source] std::io::Error),
    #[error("image has not been loaded")]
    NotLoaded,
}

impl ImageError {
    /// Errors that must stop the whole build rather than one image.
    pub fn is_fatal(&self) -> bool {
        match self {
            ImageError::Exif(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Everything an image needs from its surroundings, shared by every asset
/// of one build.
#[derive(Clone)]
pub struct ImagePipeline {
    backend: Arc<dyn ImageBackend>,
    store: Arc<dyn HashStore>,
    gear: Arc<GearTable>,
    source_root: PathBuf,
    template_dir: PathBuf,
}

impl ImagePipeline {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        store: Arc<dyn HashStore>,
        gear: Arc<GearTable>,
        source_root: impl Into<PathBuf>,
        template_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            store,
            gear,
            source_root: source_root.into(),
            template_dir: template_dir.into(),
        }
    }

    /// A not-yet-loaded asset for the photograph at `path`.
    pub fn asset(&self, path: &Path) -> ImageAsset {
        let web_path = image_web_path(path, &self.source_root);
        let mut meta = Metadata::new(path, &self.template_dir);
        meta.kind = Kind::Static;
        meta.web_path = web_path
            .rsplit('/')
            .next()
            .unwrap_or(web_path.as_str())
            .to_string();
        meta.title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());

        ImageAsset {
            pipeline: self.clone(),
            base: meta.clone(),
            meta,
            web_path,
            data: Vec::new(),
            hash: None,
            exif: None,
            dimensions: None,
            thumbnails: Vec::new(),
        }
    }
}

/// One photograph and the files it publishes.
pub struct ImageAsset {
    pipeline: ImagePipeline,
    base: Metadata,
    meta: Metadata,
    web_path: String,
    data: Vec<u8>,
    hash: Option<u32>,
    exif: Option<Exif>,
    dimensions: Option<(u32, u32)>,
    thumbnails: Vec<Thumbnail>,
}

impl ImageAsset {
    /// Primary output, relative to dist, forward-slash separated.
    pub fn web_path(&self) -> &str {
        &self.web_path
    }

    pub fn exif(&self) -> Option<&Exif> {
        self.exif.as_ref()
    }

    pub fn thumbnails(&self) -> &[Thumbnail] {
        &self.thumbnails
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// FNV-1 hash of the loaded source bytes.
    pub fn hash(&self) -> Option<u32> {
        self.hash
    }

    /// Cache key: the source's base file name.
    fn cache_key(&self) -> String {
        self.meta
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.web_path.clone())
    }

    fn error(&self, source: ImageError) -> DocumentError {
        DocumentError::Image {
            source_path: self.meta.source_path.clone(),
            source,
        }
    }

    fn encode(&self, image: &DynamicImage, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.pipeline
            .backend
            .encode_webp(image, out)
            .map_err(|e| self.error(e.into()))
    }

    fn decode(&self) -> Result<DynamicImage, DocumentError> {
        if self.hash.is_none() {
            return Err(self.error(ImageError::NotLoaded));
        }
        self.pipeline
            .backend
            .decode(&self.data)
            .map_err(|e| self.error(e.into()))
    }

    /// True when the stored hash matches and every output, thumbnails
    /// included, exists.
    fn is_fresh(&self, dist: &Path, hash: &str) -> Result<bool, DocumentError> {
        let stored = self
            .pipeline
            .store
            .get(&self.cache_key())
            .map_err(|e| self.error(ImageError::Cache(e)))?;
        if stored.as_deref() != Some(hash) {
            return Ok(false);
        }
        Ok(self
            .output_files()
            .iter()
            .all(|file| dist.join(file).is_file()))
    }

    fn output_files(&self) -> Vec<String> {
        std::iter::once(self.web_path.clone())
            .chain(self.thumbnails.iter().map(|t| t.web_path.clone()))
            .collect()
    }
}

impl Document for ImageAsset {
    fn depends_on(&self, path: &Path) -> bool {
        is_own_source(&self.meta, path)
    }

    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        let exif = load_exif(content, &self.pipeline.gear).map_err(|e| self.error(e.into()))?;
        let (width, height) = self
            .pipeline
            .backend
            .identify(content)
            .map_err(|e| self.error(e.into()))?;
        let stem = self
            .meta
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut meta = self.base.clone();
        meta.created_at = Some(exif.taken_at.date());

        self.thumbnails = plan_thumbnails(&self.web_path, &stem, width, height);
        self.dimensions = Some((width, height));
        self.exif = Some(exif);
        self.hash = Some(fnv1_32(content));
        self.data = content.to_vec();
        self.meta = meta;
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Encode the primary WebP.
    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        let image = self.decode()?;
        self.encode(&image, out)
    }

    fn publish(&self, dist: &Path) -> Result<Published, DocumentError> {
        let hash = self
            .hash
            .ok_or_else(|| self.error(ImageError::NotLoaded))?
            .to_string();

        if self.is_fresh(dist, &hash)? {
            debug!(source = %self.meta.source_path.display(), "image unchanged, skipping encode");
            return Ok(Published {
                files: self.output_files(),
                cache: Some(Freshness::Fresh),
            });
        }

        let image = self.decode()?;
        write_output(dist, &self.web_path, |out| self.encode(&image, out))?;
        self.thumbnails.par_iter().try_for_each(|thumb| {
            let small = self.pipeline.backend.resize(&image, thumb.width, thumb.height);
            write_output(dist, &thumb.web_path, |out| self.encode(&small, out))
        })?;

        // Only after every output is written, so a failed encode retries next build
        self.pipeline
            .store
            .put(&self.cache_key(), &hash)
            .map_err(|e| self.error(ImageError::Cache(e)))?;
        debug!(
            source = %self.meta.source_path.display(),
            thumbnails = self.thumbnails.len(),
            "encoded image"
        );

        Ok(Published {
            files: self.output_files(),
            cache: Some(Freshness::Encoded),
        })
    }
}

/// Where a photograph publishes: its path under the source root, with a
/// `.webp` extension. Photographs outside the root publish by file name.
pub fn image_web_path(source: &Path, source_root: &Path) -> String {
    let source = clean_path(source);
    let root = clean_path(source_root);
    let relative = match source.strip_prefix(&root) {
        Ok(rel) if !rel.as_os_str().is_empty() && !root.as_os_str().is_empty() => rel.to_path_buf(),
        _ => source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| source.clone()),
    };
    relative
        .with_extension("webp")
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
