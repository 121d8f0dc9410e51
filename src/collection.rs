//! The collection: every document of a site, and the builds over them.
//!
//! Documents are kept sorted by creation date, newest first; documents
//! without a date sort last, and ties keep insertion order. Identity is the
//! source path: upserting a path that is already present replaces that
//! document in place.
//!
//! ## Builds
//!
//! A build runs in two passes over a set of documents:
//!
//! 1. **Load** each document from its source bytes, then re-sort (a load
//!    may change a creation date).
//! 2. **Publish** each successfully loaded document, in collection order.
//!
//! A full build covers every document; an incremental build for a changed
//! path covers only the documents whose `depends_on` accepts it.
//!
//! Failures are per document: a parse or encode error is recorded in the
//! [`BuildReport`] and the rest of the collection still builds. The one
//! exception is a photograph carrying location data, which stops the build
//! immediately with [`BuildError::Fatal`].

use crate::cache::{CacheStats, HashStore};
use crate::config::SiteConfig;
use crate::document::{DependencyPolicy, Document, DocumentError, Freshness, chain_for, clean_path};
use crate::imaging::{ImageBackend, ImagePipeline};
use crate::metadata::Metadata;
use crate::scan::{Source, SourceKind, SourceReader};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build stopped: {0}")]
    Fatal(DocumentError),
}

/// Everything needed to turn a discovered source into a document.
#[derive(Clone)]
pub struct BuildContext {
    template_dir: PathBuf,
    policy: Arc<DependencyPolicy>,
    images: ImagePipeline,
}

impl BuildContext {
    pub fn new(template_dir: impl Into<PathBuf>, policy: Arc<DependencyPolicy>, images: ImagePipeline) -> Self {
        Self {
            template_dir: template_dir.into(),
            policy,
            images,
        }
    }

    /// Context for a project configured by `config`.
    pub fn from_config(
        config: &SiteConfig,
        backend: Arc<dyn ImageBackend>,
        store: Arc<dyn HashStore>,
    ) -> Self {
        let images = ImagePipeline::new(
            backend,
            store,
            Arc::new(config.gear_table()),
            &config.paths.source,
            &config.paths.templates,
        );
        Self::new(&config.paths.templates, DependencyPolicy::from_config(config), images)
    }

    /// A fresh, unloaded document for `source`.
    pub fn document_for(&self, source: &Source) -> Box<dyn Document> {
        match source.kind {
            SourceKind::Image => Box::new(self.images.asset(&source.path)),
            _ => chain_for(&source.path, &self.template_dir, Arc::clone(&self.policy)),
        }
    }
}

/// One published document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDocument {
    pub source_path: PathBuf,
    /// Files written (or left fresh), relative to dist.
    pub files: Vec<String>,
}

/// Outcome of one build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<BuiltDocument>,
    /// Documents that failed; none of their outputs changed.
    pub failed: Vec<DocumentError>,
    pub cache: CacheStats,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn files_written(&self) -> usize {
        self.built.iter().map(|d| d.files.len()).sum()
    }
}

/// All documents of a site, newest first.
#[derive(Default)]
pub struct Collection {
    documents: Vec<Box<dyn Document>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding one unloaded document per source.
    pub fn from_sources(context: &BuildContext, sources: &[Source]) -> Self {
        let mut collection = Self::new();
        for source in sources {
            collection.upsert(context.document_for(source));
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Document> {
        self.documents.iter().map(|d| d.as_ref())
    }

    /// Metadata of every document, in collection order.
    pub fn listing(&self) -> Vec<&Metadata> {
        self.iter().map(|d| d.metadata()).collect()
    }

    fn position(&self, path: &Path) -> Option<usize> {
        let path = clean_path(path);
        self.documents
            .iter()
            .position(|d| clean_path(&d.metadata().source_path) == path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    /// Add `document`, replacing any document with the same source path.
    pub fn upsert(&mut self, document: Box<dyn Document>) {
        match self.position(&document.metadata().source_path) {
            Some(i) => self.documents[i] = document,
            None => self.documents.push(document),
        }
        self.sort();
    }

    /// Drop the document built from `path`. Its published files stay in place.
    pub fn remove(&mut self, path: &Path) -> bool {
        match self.position(path) {
            Some(i) => {
                self.documents.remove(i);
                true
            }
            None => false,
        }
    }

    fn sort(&mut self) {
        self.documents.sort_by(|a, b| {
            newest_first(a.metadata().created_at, b.metadata().created_at)
        });
    }

    /// Source paths of the documents that must rebuild when `path` changes.
    pub fn dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.documents
            .iter()
            .filter(|d| d.depends_on(path))
            .map(|d| d.metadata().source_path.clone())
            .collect()
    }

    /// Load and publish every document.
    pub fn build_all(
        &mut self,
        reader: &dyn SourceReader,
        dist: &Path,
    ) -> Result<BuildReport, BuildError> {
        let targets = self.source_paths();
        info!(documents = targets.len(), "full build");
        self.build(&targets, reader, dist)
    }

    /// Load and publish only the documents that depend on `changed`.
    pub fn rebuild(
        &mut self,
        changed: &Path,
        reader: &dyn SourceReader,
        dist: &Path,
    ) -> Result<BuildReport, BuildError> {
        let targets = self.dependents(changed);
        info!(changed = %changed.display(), documents = targets.len(), "incremental build");
        self.build(&targets, reader, dist)
    }

    /// Load every document without publishing anything.
    pub fn load_all(&mut self, reader: &dyn SourceReader) -> Result<BuildReport, BuildError> {
        let targets = self.source_paths();
        let mut report = BuildReport::default();
        self.load(&targets, reader, &mut report)?;
        Ok(report)
    }

    fn source_paths(&self) -> Vec<PathBuf> {
        self.documents
            .iter()
            .map(|d| d.metadata().source_path.clone())
            .collect()
    }

    /// Load `targets`, then re-sort. Returns the paths that loaded.
    fn load(
        &mut self,
        targets: &[PathBuf],
        reader: &dyn SourceReader,
        report: &mut BuildReport,
    ) -> Result<HashSet<PathBuf>, BuildError> {
        let mut loaded = HashSet::new();
        for path in targets {
            let Some(i) = self.position(path) else {
                continue;
            };
            let result = reader
                .read(path)
                .map_err(|source| DocumentError::Io {
                    path: path.clone(),
                    source,
                })
                .and_then(|bytes| self.documents[i].load(&bytes));
            match result {
                Ok(()) => {
                    debug!(source = %path.display(), "loaded");
                    loaded.insert(clean_path(path));
                }
                Err(e) => record_failure(report, e)?,
            }
        }
        self.sort();
        Ok(loaded)
    }

    fn build(
        &mut self,
        targets: &[PathBuf],
        reader: &dyn SourceReader,
        dist: &Path,
    ) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        let loaded = self.load(targets, reader, &mut report)?;

        let mut owners: HashMap<String, PathBuf> = HashMap::new();
        for document in &self.documents {
            let source_path = &document.metadata().source_path;
            if !loaded.contains(&clean_path(source_path)) {
                continue;
            }
            match document.publish(dist) {
                Ok(published) => {
                    match published.cache {
                        Some(Freshness::Fresh) => report.cache.record_fresh(),
                        Some(Freshness::Encoded) => report.cache.record_encoded(),
                        None => {}
                    }
                    for file in &published.files {
                        if let Some(other) = owners.insert(file.clone(), source_path.clone()) {
                            warn!(
                                file = %file,
                                first = %other.display(),
                                second = %source_path.display(),
                                "two sources publish the same file; the later one wins"
                            );
                        }
                    }
                    report.built.push(BuiltDocument {
                        source_path: source_path.clone(),
                        files: published.files,
                    });
                }
                Err(e) => record_failure(&mut report, e)?,
            }
        }

        info!(
            built = report.built.len(),
            failed = report.failed.len(),
            images = %report.cache,
            "build finished"
        );
        Ok(report)
    }
}

/// Keep a per-document failure, or stop the build if it is fatal.
fn record_failure(report: &mut BuildReport, error: DocumentError) -> Result<(), BuildError> {
    if error.is_fatal() {
        return Err(BuildError::Fatal(error));
    }
    warn!("{error}");
    report.failed.push(error);
    Ok(())
}

/// Descending by date; undated documents last.
fn newest_first(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryHashStore;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{MemoryReader, located_photo_jpeg, photo_jpeg, sample_config};
    use tempfile::TempDir;

    fn context() -> BuildContext {
        BuildContext::from_config(
            &sample_config(),
            Arc::new(MockBackend::with_dimensions(8, 4)),
            Arc::new(MemoryHashStore::new()),
        )
    }

    fn collection(paths: &[&str]) -> Collection {
        let sources: Vec<Source> = paths.iter().map(|p| Source::new(*p)).collect();
        Collection::from_sources(&context(), &sources)
    }

    fn dated(date: &str, body: &str) -> String {
        format!("---\ndate: {date}\ntype: post\n---\n{body}\n")
    }

    fn order(c: &Collection) -> Vec<String> {
        c.listing()
            .iter()
            .map(|m| m.source_path.display().to_string())
            .collect()
    }

    // =========================================================================
    // Ordering and upsert
    // =========================================================================

    #[test]
    fn newest_first_puts_undated_last() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        assert_eq!(newest_first(d("2024-01-02"), d("2024-01-01")), Ordering::Less);
        assert_eq!(newest_first(None, d("2024-01-01")), Ordering::Greater);
        assert_eq!(newest_first(None, None), Ordering::Equal);
    }

    #[test]
    fn build_sorts_by_created_date_with_stable_ties() {
        let mut c = collection(&["src/old.md", "src/undated.md", "src/new.md", "src/same.md"]);
        let reader = MemoryReader::new()
            .with("src/old.md", dated("2020-01-01", "old"))
            .with("src/undated.md", "no date")
            .with("src/new.md", dated("2024-06-01", "new"))
            .with("src/same.md", dated("2020-01-01", "same day"));
        let dist = TempDir::new().unwrap();
        c.build_all(&reader, dist.path()).unwrap();
        assert_eq!(
            order(&c),
            vec!["src/new.md", "src/old.md", "src/same.md", "src/undated.md"]
        );
    }

    #[test]
    fn upsert_same_path_replaces_in_place() {
        let ctx = context();
        let mut c = collection(&["src/a.md", "src/b.md"]);
        c.upsert(ctx.document_for(&Source::new("./src/a.md")));
        assert_eq!(c.len(), 2);
        c.upsert(ctx.document_for(&Source::new("src/c.md")));
        assert_eq!(c.len(), 3);
        assert!(c.contains(Path::new("src/c.md")));
    }

    #[test]
    fn upserting_identical_content_renders_identically() {
        let ctx = context();
        let reader = MemoryReader::new().with("src/a.md", dated("2024-01-01", "Hello"));
        let dist = TempDir::new().unwrap();

        let mut c = collection(&["src/a.md"]);
        c.build_all(&reader, dist.path()).unwrap();
        let first = std::fs::read(dist.path().join("a.html")).unwrap();

        c.upsert(ctx.document_for(&Source::new("src/a.md")));
        c.build_all(&reader, dist.path()).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(std::fs::read(dist.path().join("a.html")).unwrap(), first);
    }

    #[test]
    fn remove_drops_document() {
        let mut c = collection(&["src/a.md", "src/b.md"]);
        assert!(c.remove(Path::new("src/a.md")));
        assert!(!c.remove(Path::new("src/a.md")));
        assert_eq!(order(&c), vec!["src/b.md"]);
    }

    // =========================================================================
    // Dependents
    // =========================================================================

    #[test]
    fn dependents_of_a_page_are_itself_and_aggregators() {
        let c = collection(&["src/index.md", "src/a.md", "src/b.md", "public/CNAME"]);
        let mut deps = c.dependents(Path::new("src/a.md"));
        deps.sort();
        assert_eq!(deps, vec![PathBuf::from("src/a.md"), PathBuf::from("src/index.md")]);
    }

    #[test]
    fn shared_asset_rebuilds_every_source_but_not_static_files() {
        let c = collection(&["src/a.md", "src/b.txt", "public/style.css", "public/CNAME"]);
        let mut deps = c.dependents(Path::new("public/style.css"));
        deps.sort();
        assert_eq!(
            deps,
            vec![
                PathBuf::from("public/style.css"),
                PathBuf::from("src/a.md"),
                PathBuf::from("src/b.txt"),
            ]
        );
    }

    #[test]
    fn every_document_depends_on_its_own_source() {
        let c = collection(&["src/a.md", "src/b.txt", "src/c.html", "src/img/d.jpg", "public/e.css"]);
        for doc in c.iter() {
            let own = doc.metadata().source_path.clone();
            assert!(c.dependents(&own).contains(&own), "{}", own.display());
        }
    }

    // =========================================================================
    // Builds
    // =========================================================================

    #[test]
    fn full_build_publishes_every_form() {
        let mut c = collection(&["src/a.md", "src/notes.txt", "public/style.css", "src/img/dawn.jpg"]);
        let reader = MemoryReader::new()
            .with("src/a.md", "# Hi\n")
            .with("src/notes.txt", "plain\n")
            .with("public/style.css", "body {}")
            .with("src/img/dawn.jpg", photo_jpeg(4, 4));
        let dist = TempDir::new().unwrap();

        let report = c.build_all(&reader, dist.path()).unwrap();
        assert!(report.is_clean(), "{:?}", report.failed);
        for file in ["a.html", "a.gmi", "notes.html", "notes.gmi", "notes.txt", "style.css", "img/dawn.webp"] {
            assert!(dist.path().join(file).is_file(), "{file}");
        }
        assert_eq!(report.cache.encoded, 1);
        assert_eq!(report.cache.fresh, 0);
    }

    #[test]
    fn per_document_failures_do_not_stop_the_build() {
        let mut c = collection(&["src/bad.md", "src/good.md", "src/missing.md"]);
        let reader = MemoryReader::new()
            .with("src/bad.md", "---\ntype: essay\n---\nx\n")
            .with("src/good.md", "fine\n");
        let dist = TempDir::new().unwrap();

        let report = c.build_all(&reader, dist.path()).unwrap();
        assert_eq!(report.failed.len(), 2);
        assert!(dist.path().join("good.html").is_file());
        assert!(!dist.path().join("bad.html").exists());
    }

    #[test]
    fn location_data_stops_the_build() {
        let mut c = collection(&["src/a.md", "src/phone.jpg"]);
        let reader = MemoryReader::new()
            .with("src/a.md", "text\n")
            .with("src/phone.jpg", located_photo_jpeg(4, 4));
        let dist = TempDir::new().unwrap();

        let err = c.build_all(&reader, dist.path()).unwrap_err();
        assert!(matches!(err, BuildError::Fatal(_)));
        assert!(err.to_string().contains("src/phone.jpg"));
    }

    #[test]
    fn rebuild_touches_only_dependents() {
        let mut c = collection(&["src/a.md", "src/b.md"]);
        let reader = MemoryReader::new()
            .with("src/a.md", "first a\n")
            .with("src/b.md", "first b\n");
        let dist = TempDir::new().unwrap();
        c.build_all(&reader, dist.path()).unwrap();

        reader.insert("src/a.md", "second a\n");
        reader.insert("src/b.md", "second b\n");
        let report = c.rebuild(Path::new("src/a.md"), &reader, dist.path()).unwrap();

        assert_eq!(report.built.len(), 1);
        assert_eq!(report.built[0].source_path, PathBuf::from("src/a.md"));
        let a = std::fs::read_to_string(dist.path().join("a.gmi")).unwrap();
        let b = std::fs::read_to_string(dist.path().join("b.gmi")).unwrap();
        assert_eq!(a, "second a\n");
        assert_eq!(b, "first b\n");
    }

    #[test]
    fn load_all_fills_metadata_without_publishing() {
        let mut c = collection(&["src/a.md", "src/b.md"]);
        let reader = MemoryReader::new()
            .with("src/a.md", "---\ntitle: First\ndate: 2021-03-04\n---\nx\n")
            .with("src/b.md", dated("2023-01-01", "y"));
        let report = c.load_all(&reader).unwrap();
        assert!(report.built.is_empty());
        assert!(report.is_clean());
        assert_eq!(order(&c), vec!["src/b.md", "src/a.md"]);
        assert_eq!(c.listing()[1].title.as_deref(), Some("First"));
    }

    #[test]
    fn second_build_reports_fresh_images() {
        let mut c = collection(&["src/img/dawn.jpg"]);
        let reader = MemoryReader::new().with("src/img/dawn.jpg", photo_jpeg(4, 4));
        let dist = TempDir::new().unwrap();

        c.build_all(&reader, dist.path()).unwrap();
        let report = c.build_all(&reader, dist.path()).unwrap();
        assert_eq!(report.cache.fresh, 1);
        assert_eq!(report.cache.encoded, 0);
    }
}
