//! Terminal documents that store already-transformed bytes and replay them.
//!
//! Sinks are fed by a source's `load`, or loaded directly from a file when
//! they stand alone (a stylesheet, a hand-written HTML page). Either way,
//! `render` writes back exactly what was loaded.

use super::{Document, DocumentError, DependencyPolicy, Format, copy_bytes, is_own_source};
use crate::metadata::Metadata;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Passthrough bytes: raw text copies and static files.
#[derive(Debug, Clone)]
pub struct RawSink {
    meta: Metadata,
    data: Vec<u8>,
}

impl RawSink {
    pub fn new(meta: Metadata) -> Self {
        Self {
            meta,
            data: Vec::new(),
        }
    }
}

impl Document for RawSink {
    fn depends_on(&self, path: &Path) -> bool {
        is_own_source(&self.meta, path)
    }

    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        self.data = content.to_vec();
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        copy_bytes(&self.data, out, &self.meta.source_path)
    }
}

/// A finished HTML page.
#[derive(Debug, Clone)]
pub struct HtmlSink {
    meta: Metadata,
    html: Vec<u8>,
}

impl HtmlSink {
    pub fn new(meta: Metadata) -> Self {
        Self {
            meta,
            html: Vec::new(),
        }
    }
}

impl Document for HtmlSink {
    fn depends_on(&self, path: &Path) -> bool {
        is_own_source(&self.meta, path)
    }

    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        self.html = content.to_vec();
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        copy_bytes(&self.html, out, &self.meta.source_path)
    }
}

/// A finished gemtext page.
///
/// Unlike the other sinks, gemtext pages list their siblings, so they
/// follow the aggregator and template triggers too.
#[derive(Debug, Clone)]
pub struct GeminiSink {
    meta: Metadata,
    policy: Arc<DependencyPolicy>,
    gemtext: Vec<u8>,
}

impl GeminiSink {
    pub fn new(meta: Metadata, policy: Arc<DependencyPolicy>) -> Self {
        Self {
            meta,
            policy,
            gemtext: Vec::new(),
        }
    }
}

impl Document for GeminiSink {
    fn depends_on(&self, path: &Path) -> bool {
        self.policy.gemini_depends_on(&self.meta, path)
    }

    /// Gemtext is served as UTF-8; anything else is refused.
    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        std::str::from_utf8(content).map_err(|source| DocumentError::Encoding {
            source_path: self.meta.source_path.clone(),
            source,
        })?;
        self.gemtext = content.to_vec();
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        copy_bytes(&self.gemtext, out, &self.meta.source_path)
    }
}

/// The sinks a source fans out to: at most one per format.
#[derive(Debug, Clone, Default)]
pub struct Sinks {
    pub html: Option<HtmlSink>,
    pub gemini: Option<GeminiSink>,
    pub raw: Option<RawSink>,
}

impl Sinks {
    /// No sinks: the source renders its own stored bytes.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_none() && self.gemini.is_none() && self.raw.is_none()
    }

    pub fn depends_on(&self, path: &Path) -> bool {
        self.html.as_ref().is_some_and(|s| s.depends_on(path))
            || self.gemini.as_ref().is_some_and(|s| s.depends_on(path))
            || self.raw.as_ref().is_some_and(|s| s.depends_on(path))
    }

    pub(crate) fn get_mut(&mut self, target: Format) -> Option<&mut dyn Document> {
        match target {
            Format::Html => self.html.as_mut().map(|s| s as &mut dyn Document),
            Format::Gemini => self.gemini.as_mut().map(|s| s as &mut dyn Document),
            Format::Raw => self.raw.as_mut().map(|s| s as &mut dyn Document),
        }
    }

    /// Give every sink the source's freshly parsed metadata.
    pub(crate) fn sync_metadata(&mut self, meta: &Metadata) {
        if let Some(s) = &mut self.html {
            s.meta = meta.clone();
        }
        if let Some(s) = &mut self.gemini {
            s.meta = meta.clone();
        }
        if let Some(s) = &mut self.raw {
            s.meta = meta.clone();
        }
    }
}
