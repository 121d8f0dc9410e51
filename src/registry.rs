//! The published-path registry: every file the site has ever published.
//!
//! Published URLs must not silently disappear. After a build, [`reconcile`]
//! compares the registry against the output tree and fails if any recorded
//! path is gone, naming every missing URL at once. [`freeze`] is the operator
//! override: it records the current tree on top of the registry, accepting
//! whatever has been removed.
//!
//! ## File Format
//!
//! ```text
//! /a.html
//! /img/2023/dawn.webp
//! /style.css
//! ```
//!
//! UTF-8, one `/`-rooted path per line, sorted, trailing newline, no blank
//! lines. The file is meant to be committed alongside the sources.
//!
//! [`reconcile`]: PublishedPathRegistry::reconcile
//! [`freeze`]: PublishedPathRegistry::freeze

use crate::config::SiteConfig;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot walk output tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(
        "published URLs must not change, but this build would remove:\n\n- {}\n\n\
         Restore these files and build again.\n\
         To let them 404 for good, remove them from {} or run `sleet freeze`.",
        .urls.join("\n- "),
        .file.display()
    )]
    Regression { urls: Vec<String>, file: PathBuf },
}

/// The persisted set of published paths for one site.
#[derive(Debug, Clone)]
pub struct PublishedPathRegistry {
    file: PathBuf,
    host: String,
}

impl PublishedPathRegistry {
    pub fn new(file: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            host: host.into(),
        }
    }

    /// Registry at `paths.known_uris` under `root`, resolving URLs against the
    /// production host.
    pub fn from_config(root: &Path, config: &SiteConfig) -> Self {
        Self::new(root.join(&config.paths.known_uris), config.production.host())
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The persisted paths. A missing registry file is created empty.
    pub fn load(&self) -> Result<BTreeSet<String>, RegistryError> {
        match fs::read_to_string(&self.file) {
            Ok(content) => Ok(content.lines().filter_map(normalize).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.file.display(), "creating empty registry");
                self.write(&BTreeSet::new())?;
                Ok(BTreeSet::new())
            }
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Fail if any persisted path is missing from `dist`. Writes nothing.
    pub fn reconcile(&self, dist: &Path) -> Result<(), RegistryError> {
        let known = self.load()?;
        let present = present_paths(dist)?;
        let urls: Vec<String> = known
            .difference(&present)
            .map(|path| self.url(path))
            .collect();
        if !urls.is_empty() {
            return Err(RegistryError::Regression {
                urls,
                file: self.file.clone(),
            });
        }
        debug!(paths = known.len(), "every published path is present");
        Ok(())
    }

    /// Persist the union of the registry and `dist`. Returns how many paths
    /// were newly recorded.
    pub fn freeze(&self, dist: &Path) -> Result<usize, RegistryError> {
        let mut known = self.load()?;
        let before = known.len();
        known.extend(present_paths(dist)?);
        self.write(&known)?;
        let added = known.len() - before;
        info!(added, total = known.len(), "registry frozen");
        Ok(added)
    }

    /// Fully resolved URL for a registry path.
    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.host, path)
    }

    fn write(&self, paths: &BTreeSet<String>) -> Result<(), RegistryError> {
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let content: String = paths.iter().map(|p| format!("{p}\n")).collect();
        fs::write(&self.file, content).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.file.clone(),
            source,
        }
    }
}

/// Every non-directory path under `dist`, as `/`-rooted strings.
/// A missing `dist` has no paths.
pub fn present_paths(dist: &Path) -> Result<BTreeSet<String>, RegistryError> {
    let mut paths = BTreeSet::new();
    if !dist.is_dir() {
        return Ok(paths);
    }
    for entry in WalkDir::new(dist) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dist) else {
            continue;
        };
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        match parts {
            Some(parts) => {
                paths.insert(format!("/{}", parts.join("/")));
            }
            None => warn!(path = %entry.path().display(), "skipping output with a non-UTF-8 name"),
        }
    }
    Ok(paths)
}

fn normalize(line: &str) -> Option<String> {
    let line = line.trim();
    match line {
        "" => None,
        l if l.starts_with('/') => Some(l.to_string()),
        l => Some(format!("/{l}")),
    }
}
