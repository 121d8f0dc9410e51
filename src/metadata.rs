//! Document metadata: lexical defaults plus YAML frontmatter.
//!
//! Every document starts from [`Metadata::new`], which derives output names
//! from the source path alone (no I/O). Loading a document then overlays the
//! frontmatter block at the top of its source:
//!
//! ```text
//! ---
//! title: On Building Things
//! date: 2024-03-01
//! type: post
//! toc: true
//! ---
//! Body text...
//! ```
//!
//! | Key | Field | Notes |
//! |-----|-------|-------|
//! | `title` | `title` | |
//! | `date` | `created_at` | `YYYY-MM-DD` or RFC 3339 |
//! | `updated` | `updated_at` | same formats as `date` |
//! | `type` | `kind` | `draft` (or empty), `post`, `page`, `gallery` |
//! | `category` | `category` | |
//! | `preview` | `preview` | one-sentence teaser |
//! | `toc` | `toc` | render a table of contents |
//! | `filename` | `web_path` | must be a single path segment |
//! | `parent` | `parent` | file name of another document |
//! | `layout` | `layout` | template path |
//!
//! Output names (`web_path`, `gemini_path`, `raw_path`) are always a single
//! segment: the published tree is flat.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Extensions of sources that publish as text pages.
pub const TEXT_EXTENSIONS: &[&str] = &["htm", "html", "txt", "md", "markdown", "org", "tmpl"];

/// Layout file used when the frontmatter names none.
const DEFAULT_LAYOUT: &str = "text_document.html";

/// Replaces path separators in generated output names.
const SEPARATOR_REPLACEMENT: char = '_';

/// Output name for sources whose path has no usable file name.
const FALLBACK_NAME: &str = "untitled";

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("invalid YAML frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("source is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("unknown document type {0:?}")]
    UnknownKind(String),
    #[error("filename {0:?} must be a single path segment")]
    NestedFilename(String),
}

/// What a document is, as set by the frontmatter `type` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Kind {
    #[default]
    Draft,
    Post,
    Page,
    /// Galleries and other pages built around assets.
    Static,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Draft => "draft",
            Kind::Post => "post",
            Kind::Page => "page",
            Kind::Static => "gallery",
        }
    }
}

impl FromStr for Kind {
    type Err = FrontmatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "draft" => Ok(Kind::Draft),
            "post" => Ok(Kind::Post),
            "page" => Ok(Kind::Page),
            "gallery" | "static" => Ok(Kind::Static),
            other => Err(FrontmatterError::UnknownKind(other.to_string())),
        }
    }
}

impl TryFrom<String> for Kind {
    type Error = FrontmatterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive record attached to every document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub kind: Kind,
    pub created_at: Option<NaiveDate>,
    pub updated_at: Option<NaiveDate>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub preview: Option<String>,
    pub toc: bool,
    /// HTML output name, relative to dist.
    pub web_path: String,
    /// Gemtext output name. `None` for files that publish only one form.
    pub gemini_path: Option<String>,
    /// Raw copy output name. Only plain-text sources have one.
    pub raw_path: Option<String>,
    pub source_path: PathBuf,
    pub template_dir: PathBuf,
    pub layout: PathBuf,
    /// File name of the document this one is a child of. Purely semantic.
    pub parent: Option<String>,
}

impl Metadata {
    /// Derive default metadata from a source path.
    ///
    /// Purely lexical: nothing is read from disk. The stem is the file name
    /// up to its first `.`, so `notes.draft.md` publishes as `notes.html`.
    pub fn new(source: &Path, template_dir: &Path) -> Self {
        let filename = source
            .file_name()
            .map(|n| flat_name(&n.to_string_lossy()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        let stem = match filename.find('.') {
            Some(0) | None => filename.as_str(),
            Some(i) => &filename[..i],
        };
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let is_text = ext
            .as_deref()
            .is_some_and(|e| TEXT_EXTENSIONS.contains(&e));
        let (web_path, gemini_path) = if is_text {
            (format!("{stem}.html"), Some(format!("{stem}.gmi")))
        } else {
            // Extensionless files like CNAME must not be shadowed by a .gmi twin.
            (filename.clone(), None)
        };
        let raw_path = (ext.as_deref() == Some("txt")).then(|| filename.clone());

        Self {
            kind: Kind::Draft,
            created_at: None,
            updated_at: None,
            title: None,
            category: None,
            preview: None,
            toc: false,
            web_path,
            gemini_path,
            raw_path,
            source_path: source.to_path_buf(),
            template_dir: template_dir.to_path_buf(),
            layout: template_dir.join(DEFAULT_LAYOUT),
            parent: None,
        }
    }

    /// True when the document's kind matches `kind` (`"post"`, `"gallery"`, ...).
    /// Unknown kind names never match.
    pub fn is_kind(&self, kind: &str) -> bool {
        kind.parse::<Kind>().is_ok_and(|k| k == self.kind)
    }

    /// Overlay parsed frontmatter onto these defaults.
    pub fn apply(&mut self, fm: Frontmatter) -> Result<(), FrontmatterError> {
        if let Some(filename) = fm.filename {
            if filename.contains(['/', '\\']) || matches!(filename.as_str(), "" | "." | "..") {
                return Err(FrontmatterError::NestedFilename(filename));
            }
            self.web_path = filename;
        }
        if let Some(kind) = fm.kind {
            self.kind = kind;
        }
        if let Some(layout) = fm.layout {
            self.layout = PathBuf::from(layout);
        }
        self.title = fm.title.or(self.title.take());
        self.category = fm.category.or(self.category.take());
        self.preview = fm.preview.or(self.preview.take());
        self.parent = fm.parent.or(self.parent.take());
        self.created_at = fm.date.or(self.created_at);
        self.updated_at = fm.updated.or(self.updated_at);
        self.toc = fm.toc.unwrap_or(self.toc);
        Ok(())
    }

    /// Split `content` into frontmatter and body, overlay the frontmatter,
    /// and return the body.
    pub fn load<'a>(&mut self, content: &'a [u8]) -> Result<&'a str, FrontmatterError> {
        let text = std::str::from_utf8(content)?;
        let (fm, body) = parse_frontmatter(text)?;
        self.apply(fm)?;
        Ok(body)
    }
}

/// Replace path separators so the result is a single path segment.
pub fn flat_name(name: &str) -> String {
    name.replace(['/', '\\'], &SEPARATOR_REPLACEMENT.to_string())
}

/// Keys recognised in a frontmatter block. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub category: Option<String>,
    pub preview: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<Kind>,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_date")]
    pub updated: Option<NaiveDate>,
    pub toc: Option<bool>,
    pub filename: Option<String>,
    pub parent: Option<String>,
    pub layout: Option<String>,
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.date_naive()))
        .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}")))
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)(.*)\z")
            .expect("valid frontmatter regex")
    })
}

/// Parse a frontmatter block from the top of `content`.
///
/// Returns the parsed keys and the remaining body. Content without a
/// block yields default frontmatter and the full content as body.
pub fn parse_frontmatter(content: &str) -> Result<(Frontmatter, &str), FrontmatterError> {
    let Some(captures) = frontmatter_regex().captures(content) else {
        return Ok((Frontmatter::default(), content));
    };
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());
    if yaml.trim().is_empty() {
        return Ok((Frontmatter::default(), body));
    }
    let fm: Frontmatter = serde_yaml::from_str(yaml)?;
    Ok((fm, body))
}
