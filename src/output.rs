//! CLI output formatting.
//!
//! Output is **information-first**: each document is shown by its semantic
//! identity (title, or source file when untitled) with a positional index,
//! and filesystem paths follow as indented context lines.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! 001 src/hello.md → hello.html
//!     Also: hello.gmi
//! 002 src/img/dawn.jpg → img/dawn.webp
//!     Also: img/thumbnails/dawn.1x1.webp, img/thumbnails/dawn.2x1.webp
//!
//! Failed
//!     cannot parse src/bad.md: unknown document type "essay"
//!
//! Built 2 documents (5 files), 1 failed
//! Images: 1 encoded
//! ```
//!
//! ## List
//!
//! ```text
//! 001 Hello World → hello.html
//!     post, 2024-01-02
//!     Source: src/hello.md
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::collection::BuildReport;
use crate::metadata::Metadata;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Header line: index, identity, primary output.
///
/// ```text
/// 001 Hello World → hello.html
/// ```
fn entity_header(index: usize, identity: &str, primary: Option<&str>) -> String {
    match primary {
        Some(p) => format!("{} {} → {}", format_index(index), identity, p),
        None => format!("{} {}", format_index(index), identity),
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, doc) in report.built.iter().enumerate() {
        let identity = doc.source_path.display().to_string();
        let (primary, rest) = match doc.files.split_first() {
            Some((first, rest)) => (Some(first.as_str()), rest),
            None => (None, &[][..]),
        };
        lines.push(entity_header(i + 1, &identity, primary));
        if !rest.is_empty() {
            lines.push(format!("{}Also: {}", indent(1), rest.join(", ")));
        }
    }

    if !report.failed.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Failed".to_string());
        for error in &report.failed {
            lines.push(format!("{}{}", indent(1), error));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!(
        "Built {} ({})",
        plural(report.built.len(), "document"),
        plural(report.files_written(), "file")
    );
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    lines.push(summary);
    if report.cache.total() > 0 {
        lines.push(format!("Images: {}", report.cache));
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

pub fn format_listing(listing: &[&Metadata]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, meta) in listing.iter().enumerate() {
        let identity = match meta.title.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("({})", meta.source_path.display()),
        };
        lines.push(entity_header(i + 1, &identity, Some(&meta.web_path)));

        let mut detail = meta.kind.to_string();
        if let Some(date) = meta.created_at {
            detail.push_str(&format!(", {}", date.format("%Y-%m-%d")));
        }
        if let Some(category) = &meta.category {
            detail.push_str(&format!(", {category}"));
        }
        lines.push(format!("{}{}", indent(1), detail));
        lines.push(format!("{}Source: {}", indent(1), meta.source_path.display()));
    }
    lines
}

pub fn print_listing(listing: &[&Metadata]) {
    for line in format_listing(listing) {
        println!("{}", line);
    }
}

// ============================================================================
// Freeze
// ============================================================================

pub fn format_freeze(added: usize, registry: &std::path::Path) -> Vec<String> {
    vec![format!(
        "Recorded {} in {}",
        plural(added, "new path"),
        registry.display()
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::collection::BuiltDocument;
    use crate::document::DocumentError;
    use crate::metadata::Kind;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "file"), "1 file");
        assert_eq!(plural(0, "file"), "0 files");
        assert_eq!(plural(3, "file"), "3 files");
    }

    #[test]
    fn entity_header_with_and_without_output() {
        assert_eq!(entity_header(1, "Hello", Some("hello.html")), "001 Hello → hello.html");
        assert_eq!(entity_header(2, "Hello", None), "002 Hello");
    }

    // =========================================================================
    // Build report
    // =========================================================================

    #[test]
    fn build_report_lists_documents_failures_and_cache() {
        let mut cache = CacheStats::default();
        cache.record_fresh();
        let report = BuildReport {
            built: vec![
                BuiltDocument {
                    source_path: PathBuf::from("src/hello.md"),
                    files: vec!["hello.html".into(), "hello.gmi".into()],
                },
                BuiltDocument {
                    source_path: PathBuf::from("public/style.css"),
                    files: vec!["style.css".into()],
                },
            ],
            failed: vec![DocumentError::Io {
                path: PathBuf::from("src/gone.md"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            }],
            cache,
        };
        let lines = format_build_report(&report);
        assert_eq!(lines[0], "001 src/hello.md → hello.html");
        assert_eq!(lines[1], "    Also: hello.gmi");
        assert_eq!(lines[2], "002 public/style.css → style.css");
        assert_eq!(lines[4], "Failed");
        assert!(lines[5].contains("src/gone.md"));
        assert_eq!(lines[7], "Built 2 documents (3 files), 1 failed");
        assert_eq!(lines[8], "Images: 1 fresh, 0 encoded (1 total)");
    }

    #[test]
    fn empty_build_report_is_one_summary_line() {
        let lines = format_build_report(&BuildReport::default());
        assert_eq!(lines, vec!["Built 0 documents (0 files)"]);
    }

    // =========================================================================
    // Listing
    // =========================================================================

    #[test]
    fn listing_shows_title_kind_date_and_source() {
        let mut meta = Metadata::new(Path::new("src/hello.md"), Path::new("src/templates"));
        meta.title = Some("Hello World".to_string());
        meta.kind = Kind::Post;
        meta.created_at = NaiveDate::from_ymd_opt(2024, 1, 2);
        let lines = format_listing(&[&meta]);
        assert_eq!(
            lines,
            vec![
                "001 Hello World → hello.html",
                "    post, 2024-01-02",
                "    Source: src/hello.md",
            ]
        );
    }

    #[test]
    fn untitled_documents_list_by_source() {
        let meta = Metadata::new(Path::new("public/CNAME"), Path::new("src/templates"));
        let lines = format_listing(&[&meta]);
        assert_eq!(lines[0], "001 (public/CNAME) → CNAME");
        assert_eq!(lines[1], "    draft");
    }

    #[test]
    fn freeze_summary() {
        assert_eq!(
            format_freeze(1, Path::new("src/uris.txt")),
            vec!["Recorded 1 new path in src/uris.txt"]
        );
    }
}
