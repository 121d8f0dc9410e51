//! Source discovery.
//!
//! Walks the project's source and static directories and hands the build
//! an ordered list of `(path, kind)` pairs. Bytes are read on demand through
//! a [`SourceReader`], so the build itself never touches the directory tree.
//!
//! ## Directory Structure
//!
//! ```text
//! project/
//! ├── sleet.toml
//! ├── src/                     # paths.source
//! │   ├── index.md             # Markdown → HTML + gemtext
//! │   ├── notes.txt            # Text → HTML + gemtext + raw
//! │   ├── about.html           # hand-written HTML, copied
//! │   ├── uris.txt             # paths.known_uris (skipped)
//! │   ├── templates/           # paths.templates (skipped)
//! │   └── img/2023/dawn.jpg    # Photograph → WebP + thumbnails
//! └── public/                  # paths.static
//!     ├── style.css            # copied verbatim
//!     └── CNAME
//! ```
//!
//! Hidden files and directories (leading `.`) are skipped everywhere.
//! Paths are returned relative to the project root, sorted.

use crate::config::SiteConfig;
use crate::imaging::PHOTO_EXTENSIONS;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// How a source file is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markdown,
    Text,
    Html,
    Image,
    Static,
}

/// Kind hint for `path`, from its extension alone.
pub fn classify(path: &Path) -> SourceKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" | "markdown" => SourceKind::Markdown,
        "txt" | "org" => SourceKind::Text,
        "html" | "htm" | "tmpl" => SourceKind::Html,
        e if PHOTO_EXTENSIONS.contains(&e) => SourceKind::Image,
        _ => SourceKind::Static,
    }
}

/// One discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    /// Relative to the project root.
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = classify(&path);
        Self { path, kind }
    }
}

/// Supplies source bytes by project-relative path.
pub trait SourceReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads sources from a project directory.
#[derive(Debug, Clone)]
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path))
    }
}

/// Every buildable file under the source and static directories.
pub fn discover(root: &Path, config: &SiteConfig) -> Result<Vec<Source>, ScanError> {
    let skipped = [
        root.join(&config.paths.templates),
        root.join(&config.paths.known_uris),
        root.join(&config.paths.dist),
    ];
    let mut found = BTreeSet::new();

    for dir in [&config.paths.source, &config.paths.static_dir] {
        let dir = root.join(dir);
        if !dir.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e) && !skipped.iter().any(|s| e.path() == s));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                found.insert(rel.to_path_buf());
            }
        }
    }

    Ok(found.into_iter().map(Source::new).collect())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}
