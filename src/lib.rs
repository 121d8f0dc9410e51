//! # Sleet
//!
//! A static site generator for a personal site of writing and photographs,
//! published to the web and to Gemini at once. Markdown and plain-text
//! sources become HTML pages and gemtext twins; photographs become WebP
//! images with a ladder of thumbnails; everything else is copied as-is.
//!
//! # Architecture
//!
//! ```text
//! scan        src/, public/  →  [(path, kind)]
//! collection  sources        →  documents, newest first
//!   load      bytes          →  metadata + per-format buffers (source → sinks)
//!   publish   buffers        →  dist/
//! registry    dist/          →  src/uris.txt  (no published URL may vanish)
//! ```
//!
//! A source document parses its input once and hands each output format its
//! own representation through a chained sink. Incremental builds ask every
//! document whether it depends on the changed path and rebuild only those.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the source and static directories; reads bytes on demand |
//! | [`metadata`] | Per-document metadata, derived from the path and the frontmatter |
//! | [`document`] | The `Document` contract, Markdown and text sources, HTML/gemtext/raw sinks |
//! | [`imaging`] | Photographs: EXIF, thumbnail planning, WebP encoding |
//! | [`cache`] | Source-hash store that lets unchanged photographs skip encoding |
//! | [`collection`] | Owns every document; full and incremental builds |
//! | [`registry`] | Published-path history: reconcile and freeze |
//! | [`config`] | `sleet.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Flat Output
//!
//! Pages publish under a single-segment name (`notes.html`, `notes.gmi`)
//! regardless of where their source lives. Only photographs keep their
//! directory structure, so that thumbnails can sit next to their image.
//!
//! ## Cool URIs Don't Change
//!
//! Every path ever published is recorded in a committed registry file. A
//! build that would drop one fails, listing every URL it would break. Removal
//! is an explicit act: `sleet freeze`.
//!
//! ## Privacy Before Publishing
//!
//! A photograph carrying GPS data stops the whole build. Everything else that
//! can go wrong with a single document only skips that document.

pub mod cache;
pub mod collection;
pub mod config;
pub mod document;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod registry;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
