//! Documents: the unit of loading, rendering and rebuild tracking.
//!
//! Every published file comes from a [`Document`]. Variants:
//!
//! | Variant | Role | Output |
//! |---|---|---|
//! | [`MarkdownSource`] | parses Markdown once, fans out | HTML + gemtext |
//! | [`TextSource`] | parses plain text once, fans out | HTML + gemtext + raw |
//! | [`HtmlSink`] | stores and replays HTML | `web_path` |
//! | [`GeminiSink`] | stores and replays gemtext | `gemini_path` |
//! | [`RawSink`] | stores and replays bytes | `raw_path`, or `web_path` standalone |
//! | [`ImageAsset`](crate::imaging::ImageAsset) | EXIF + WebP + thumbnails | nested image paths |
//!
//! A source owns at most one sink per format in [`Sinks`]; sinks never feed
//! other sinks. Format-specific rendering is an optional capability exposed
//! through [`Document::as_gemini`] and [`Document::as_raw`].
//!
//! # Dependencies
//!
//! `depends_on(path)` answers "must this document rebuild when `path`
//! changes?". The shared rules live in one [`DependencyPolicy`]:
//!
//! - a document always depends on its own source;
//! - sources also depend on the shared assets and anything under their
//!   template directory;
//! - aggregator pages (index, archives, listings) depend on everything;
//! - a source depends on whatever its sinks depend on.

mod gemtext;
mod html;
pub mod sink;
pub mod source;

pub use sink::{GeminiSink, HtmlSink, RawSink, Sinks};
pub use source::{MarkdownSource, TextSource, chain_for};

use crate::config::SiteConfig;
use crate::imaging::ImageError;
use crate::metadata::{FrontmatterError, Metadata};
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Output formats a document can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Html,
    Gemini,
    Raw,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Html => "html",
            Format::Gemini => "gemini",
            Format::Raw => "raw",
        })
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot parse {}: {source}", .source_path.display())]
    Parse {
        source_path: PathBuf,
        source: FrontmatterError,
    },
    #[error("cannot load {target} form of {}: {source}", .source_path.display())]
    Sink {
        source_path: PathBuf,
        target: Format,
        source: Box<DocumentError>,
    },
    #[error("{}: {source}", .source_path.display())]
    Image {
        source_path: PathBuf,
        source: ImageError,
    },
    #[error("gemtext for {} is not valid UTF-8: {source}", .source_path.display())]
    Encoding {
        source_path: PathBuf,
        source: std::str::Utf8Error,
    },
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Errors that must stop the whole build, not just this document.
    pub fn is_fatal(&self) -> bool {
        match self {
            DocumentError::Image { source, .. } => source.is_fatal(),
            DocumentError::Sink { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

/// Whether a published image reused its previous outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Encoded,
}

/// What [`Document::publish`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Files written, relative to dist, forward-slash separated.
    pub files: Vec<String>,
    /// Set for images only.
    pub cache: Option<Freshness>,
}

/// Something that can be built from one source file.
pub trait Document {
    /// True if and only if a change to `path` must rebuild this document.
    fn depends_on(&self, path: &Path) -> bool;

    /// Parse `content`, replacing anything stored by a previous call.
    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError>;

    fn metadata(&self) -> &Metadata;

    /// Write the document's primary form.
    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError>;

    fn as_gemini(&self) -> Option<&dyn GeminiRenderer> {
        None
    }

    fn as_raw(&self) -> Option<&dyn RawRenderer> {
        None
    }

    /// Write every form this document has into `dist`.
    fn publish(&self, dist: &Path) -> Result<Published, DocumentError> {
        let meta = self.metadata();
        let mut files = Vec::new();

        write_output(dist, &meta.web_path, |out| self.render(out))?;
        files.push(meta.web_path.clone());

        if let (Some(gemini), Some(path)) = (self.as_gemini(), meta.gemini_path.as_deref()) {
            write_output(dist, path, |out| gemini.render_gemini(out))?;
            files.push(path.to_string());
        }
        if let (Some(raw), Some(path)) = (self.as_raw(), meta.raw_path.as_deref()) {
            write_output(dist, path, |out| raw.render_raw(out))?;
            files.push(path.to_string());
        }

        Ok(Published { files, cache: None })
    }
}

/// Documents with a gemtext form.
pub trait GeminiRenderer {
    fn render_gemini(&self, out: &mut dyn Write) -> Result<(), DocumentError>;
}

/// Documents with a raw, unprocessed form.
pub trait RawRenderer {
    fn render_raw(&self, out: &mut dyn Write) -> Result<(), DocumentError>;
}

/// Render into a buffer, then write `dist/<rel>`, creating parent directories.
///
/// Nothing is written when rendering fails.
pub(crate) fn write_output<F>(dist: &Path, rel: &str, render: F) -> Result<(), DocumentError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), DocumentError>,
{
    let mut buf = Vec::new();
    render(&mut buf)?;
    let path = dist.join(rel);
    let io_err = |source| DocumentError::Io {
        path: path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&path, buf).map_err(io_err)
}

/// Copy stored bytes to `out`, attributing failures to `source_path`.
pub(crate) fn copy_bytes(
    bytes: &[u8],
    out: &mut dyn Write,
    source_path: &Path,
) -> Result<(), DocumentError> {
    out.write_all(bytes).map_err(|source| DocumentError::Io {
        path: source_path.to_path_buf(),
        source,
    })
}

/// Rebuild triggers shared by every document in a build.
#[derive(Debug, Clone, Default)]
pub struct DependencyPolicy {
    shared_assets: Vec<PathBuf>,
    aggregators: Vec<String>,
}

impl DependencyPolicy {
    pub fn new<A, B>(shared_assets: A, aggregators: B) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<Path>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        Self {
            shared_assets: shared_assets
                .into_iter()
                .map(|p| clean_path(p.as_ref()))
                .collect(),
            aggregators: aggregators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Arc<Self> {
        Arc::new(Self::new(
            &config.dependencies.shared_assets,
            config.dependencies.aggregators.iter().cloned(),
        ))
    }

    /// Pages summarizing the whole collection depend on every path.
    pub fn is_aggregator(&self, meta: &Metadata) -> bool {
        let name = meta.web_path.trim_start_matches('/');
        self.aggregators.iter().any(|a| a.trim_start_matches('/') == name)
    }

    pub fn is_shared_asset(&self, path: &Path) -> bool {
        let path = clean_path(path);
        self.shared_assets.iter().any(|a| *a == path)
    }

    /// Triggers for source documents.
    pub fn source_depends_on(&self, meta: &Metadata, path: &Path) -> bool {
        is_own_source(meta, path)
            || self.is_shared_asset(path)
            || is_template(meta, path)
            || self.is_aggregator(meta)
    }

    /// Triggers for gemtext sinks: like sources, minus the shared assets.
    pub fn gemini_depends_on(&self, meta: &Metadata, path: &Path) -> bool {
        is_own_source(meta, path) || is_template(meta, path) || self.is_aggregator(meta)
    }
}

pub(crate) fn is_own_source(meta: &Metadata, path: &Path) -> bool {
    clean_path(path) == clean_path(&meta.source_path)
}

fn is_template(meta: &Metadata, path: &Path) -> bool {
    let dir = clean_path(&meta.template_dir);
    !dir.as_os_str().is_empty() && clean_path(path).starts_with(&dir)
}

/// Lexically normalize a path: drop `.` components and resolve `..`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
