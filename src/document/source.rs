//! Source documents: parse once, fan out to every chained sink.
//!
//! A source keeps its own rendered bytes for each format. With a sink
//! chained for a format, rendering that format goes through the sink;
//! without one, the source replays its own bytes.

use super::sink::{GeminiSink, HtmlSink, RawSink, Sinks};
use super::{
    DependencyPolicy, Document, DocumentError, Format, GeminiRenderer, RawRenderer, copy_bytes,
    gemtext, html,
};
use crate::metadata::Metadata;
use crate::scan::{SourceKind, classify};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// State shared by every source variant.
#[derive(Debug, Clone)]
struct Chain {
    /// Lexical defaults; each load starts over from these.
    base: Metadata,
    meta: Metadata,
    policy: Arc<DependencyPolicy>,
    sinks: Sinks,
}

impl Chain {
    fn new(meta: Metadata, policy: Arc<DependencyPolicy>, sinks: Sinks) -> Self {
        Self {
            base: meta.clone(),
            meta,
            policy,
            sinks,
        }
    }

    /// Split frontmatter from body without touching stored state.
    fn parse<'a>(&self, content: &'a [u8]) -> Result<(Metadata, &'a str), DocumentError> {
        let mut meta = self.base.clone();
        let body = meta
            .load(content)
            .map_err(|source| DocumentError::Parse {
                source_path: self.base.source_path.clone(),
                source,
            })?;
        Ok((meta, body))
    }

    /// Hand each rendered form to its sink, then adopt `meta`. Sinks are
    /// loaded on a copy, so a failing sink leaves the whole chain as it was.
    fn commit(&mut self, meta: Metadata, forms: &[(Format, &[u8])]) -> Result<(), DocumentError> {
        let mut sinks = self.sinks.clone();
        sinks.sync_metadata(&meta);
        for &(target, bytes) in forms {
            if let Some(sink) = sinks.get_mut(target) {
                sink.load(bytes).map_err(|e| DocumentError::Sink {
                    source_path: meta.source_path.clone(),
                    target,
                    source: Box::new(e),
                })?;
            }
        }
        self.sinks = sinks;
        self.meta = meta;
        Ok(())
    }

    fn sink(&self, target: Format) -> Option<&dyn Document> {
        match target {
            Format::Html => self.sinks.html.as_ref().map(|s| s as &dyn Document),
            Format::Gemini => self.sinks.gemini.as_ref().map(|s| s as &dyn Document),
            Format::Raw => self.sinks.raw.as_ref().map(|s| s as &dyn Document),
        }
    }

    fn depends_on(&self, path: &Path) -> bool {
        self.policy.source_depends_on(&self.meta, path) || self.sinks.depends_on(path)
    }

    fn render(&self, target: Format, own: &[u8], out: &mut dyn Write) -> Result<(), DocumentError> {
        match self.sink(target) {
            Some(sink) => sink.render(out).map_err(|e| DocumentError::Sink {
                source_path: self.meta.source_path.clone(),
                target,
                source: Box::new(e),
            }),
            None => copy_bytes(own, out, &self.meta.source_path),
        }
    }
}

/// A Markdown file with optional YAML frontmatter.
#[derive(Debug, Clone)]
pub struct MarkdownSource {
    chain: Chain,
    html: Vec<u8>,
    gemtext: Vec<u8>,
}

impl MarkdownSource {
    pub fn new(meta: Metadata, policy: Arc<DependencyPolicy>, sinks: Sinks) -> Self {
        Self {
            chain: Chain::new(meta, policy, sinks),
            html: Vec::new(),
            gemtext: Vec::new(),
        }
    }

    /// A Markdown source chained to an HTML and a gemtext sink.
    pub fn chained(meta: Metadata, policy: Arc<DependencyPolicy>) -> Self {
        let sinks = Sinks {
            html: Some(HtmlSink::new(meta.clone())),
            gemini: Some(GeminiSink::new(meta.clone(), Arc::clone(&policy))),
            raw: None,
        };
        Self::new(meta, policy, sinks)
    }

    pub fn sinks(&self) -> &Sinks {
        &self.chain.sinks
    }
}

impl Document for MarkdownSource {
    fn depends_on(&self, path: &Path) -> bool {
        self.chain.depends_on(path)
    }

    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        let (meta, body) = self.chain.parse(content)?;
        let html = html::markdown_page(&meta, body).into_bytes();
        let gemtext = gemtext::markdown_page(&meta, body).into_bytes();
        self.chain
            .commit(meta, &[(Format::Html, html.as_slice()), (Format::Gemini, gemtext.as_slice())])?;
        self.html = html;
        self.gemtext = gemtext;
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.chain.meta
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.chain.render(Format::Html, &self.html, out)
    }

    fn as_gemini(&self) -> Option<&dyn GeminiRenderer> {
        Some(self)
    }
}

impl GeminiRenderer for MarkdownSource {
    fn render_gemini(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.chain.render(Format::Gemini, &self.gemtext, out)
    }
}

/// A plain-text file (`.txt`, `.org`) with optional YAML frontmatter.
///
/// Its HTML form is the escaped body in a `<pre>` block, its gemtext form
/// is the body verbatim, and `.txt` files also publish the body as-is.
#[derive(Debug, Clone)]
pub struct TextSource {
    chain: Chain,
    html: Vec<u8>,
    gemtext: Vec<u8>,
    raw: Vec<u8>,
}

impl TextSource {
    pub fn new(meta: Metadata, policy: Arc<DependencyPolicy>, sinks: Sinks) -> Self {
        Self {
            chain: Chain::new(meta, policy, sinks),
            html: Vec::new(),
            gemtext: Vec::new(),
            raw: Vec::new(),
        }
    }

    /// A text source chained to HTML and gemtext sinks, plus a raw sink
    /// when the file has a raw form.
    pub fn chained(meta: Metadata, policy: Arc<DependencyPolicy>) -> Self {
        let sinks = Sinks {
            html: Some(HtmlSink::new(meta.clone())),
            gemini: Some(GeminiSink::new(meta.clone(), Arc::clone(&policy))),
            raw: meta.raw_path.is_some().then(|| RawSink::new(meta.clone())),
        };
        Self::new(meta, policy, sinks)
    }

    pub fn sinks(&self) -> &Sinks {
        &self.chain.sinks
    }
}

impl Document for TextSource {
    fn depends_on(&self, path: &Path) -> bool {
        self.chain.depends_on(path)
    }

    fn load(&mut self, content: &[u8]) -> Result<(), DocumentError> {
        let (meta, body) = self.chain.parse(content)?;
        let html = html::text_page(&meta, body).into_bytes();
        let text = body.as_bytes().to_vec();
        self.chain.commit(
            meta,
            &[
                (Format::Html, html.as_slice()),
                (Format::Gemini, text.as_slice()),
                (Format::Raw, text.as_slice()),
            ],
        )?;
        self.html = html;
        self.gemtext = text.clone();
        self.raw = text;
        Ok(())
    }

    fn metadata(&self) -> &Metadata {
        &self.chain.meta
    }

    fn render(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.chain.render(Format::Html, &self.html, out)
    }

    fn as_gemini(&self) -> Option<&dyn GeminiRenderer> {
        Some(self)
    }

    fn as_raw(&self) -> Option<&dyn RawRenderer> {
        Some(self)
    }
}

impl GeminiRenderer for TextSource {
    fn render_gemini(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.chain.render(Format::Gemini, &self.gemtext, out)
    }
}

impl RawRenderer for TextSource {
    fn render_raw(&self, out: &mut dyn Write) -> Result<(), DocumentError> {
        self.chain.render(Format::Raw, &self.raw, out)
    }
}

/// Build the document chain for a non-image source file.
///
/// | Source | Document |
/// |---|---|
/// | `.md`, `.markdown` | [`MarkdownSource`] → HTML + gemtext sinks |
/// | `.txt`, `.org` | [`TextSource`] → HTML + gemtext (+ raw for `.txt`) sinks |
/// | `.html`, `.htm`, `.tmpl` | standalone [`HtmlSink`] |
/// | anything else | standalone [`RawSink`] |
///
/// Photographs go through [`ImagePipeline::asset`](crate::imaging::ImagePipeline::asset)
/// instead; handed to this function they are copied verbatim.
pub fn chain_for(
    path: &Path,
    template_dir: &Path,
    policy: Arc<DependencyPolicy>,
) -> Box<dyn Document> {
    let meta = Metadata::new(path, template_dir);
    let kind = classify(path);
    debug!(source = %path.display(), ?kind, "building document chain");
    match kind {
        SourceKind::Markdown => Box::new(MarkdownSource::chained(meta, policy)),
        SourceKind::Text => Box::new(TextSource::chained(meta, policy)),
        SourceKind::Html => Box::new(HtmlSink::new(meta)),
        SourceKind::Image | SourceKind::Static => Box::new(RawSink::new(meta)),
    }
}
