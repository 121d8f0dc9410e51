//! HTML representation of text documents.
//!
//! Markdown goes through `pulldown-cmark` and is wrapped in a Maud layout;
//! plain text is escaped into a `<pre>` block. Both produce a complete page.

use crate::metadata::Metadata;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html as md_html};
use std::collections::HashSet;

/// Heading levels listed in a table of contents.
const TOC_LEVELS: std::ops::RangeInclusive<u32> = 2..=5;

/// A table of contents with fewer entries than this is omitted.
const TOC_MIN_ENTRIES: usize = 2;

const STYLESHEET: &str = "/style.css";

/// Render a Markdown body as a complete HTML page.
pub(super) fn markdown_page(meta: &Metadata, body: &str) -> String {
    let content = markdown_to_html(body, meta.toc);
    page(meta, PreEscaped(content)).into_string()
}

/// Render a plain-text body as a complete HTML page.
pub(super) fn text_page(meta: &Metadata, body: &str) -> String {
    let content = html! {
        @if let Some(raw) = &meta.raw_path {
            p.raw-link { a href=(raw) { "See raw" } }
        }
        pre { (body) }
    };
    page(meta, content).into_string()
}

fn page(meta: &Metadata, content: Markup) -> Markup {
    let title = page_title(meta);
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href=(STYLESHEET);
            }
            body class=(meta.kind.as_str()) {
                article {
                    header {
                        h1 { (title) }
                        @if let Some(date) = meta.created_at {
                            time datetime=(date.format("%Y-%m-%d").to_string()) {
                                (date.format("%B %-d, %Y").to_string())
                            }
                        }
                    }
                    (content)
                }
            }
        }
    }
}

fn page_title(meta: &Metadata) -> &str {
    match meta.title.as_deref() {
        Some(title) if !title.is_empty() => title,
        _ => meta.web_path.strip_suffix(".html").unwrap_or(&meta.web_path),
    }
}

pub(super) fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_TASKLISTS
}

/// Markdown to an HTML fragment, optionally with a table of contents.
fn markdown_to_html(body: &str, toc: bool) -> String {
    let mut events: Vec<Event<'_>> = Parser::new_ext(body, markdown_options()).collect();
    if toc {
        insert_toc(&mut events);
    }
    let mut out = String::new();
    md_html::push_html(&mut out, events.into_iter());
    out
}

#[derive(Debug)]
struct TocEntry {
    level: u32,
    id: String,
    text: String,
}

/// Give listed headings ids and insert an `<ol id="toc">` before the first.
fn insert_toc(events: &mut Vec<Event<'_>>) {
    let mut entries = Vec::new();
    let mut used = HashSet::new();
    let mut first = None;

    for i in 0..events.len() {
        let level = match &events[i] {
            Event::Start(Tag::Heading { level, .. }) => *level as u32,
            _ => continue,
        };
        if !TOC_LEVELS.contains(&level) {
            continue;
        }
        let text = heading_text(&events[i + 1..]);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            let slug = match id.as_deref() {
                Some(existing) => existing.to_string(),
                None => unique_slug(&text, &used),
            };
            if id.is_none() {
                *id = Some(CowStr::from(slug.clone()));
            }
            used.insert(slug.clone());
            entries.push(TocEntry {
                level,
                id: slug,
                text,
            });
        }
        first.get_or_insert(i);
    }

    if entries.len() < TOC_MIN_ENTRIES {
        return;
    }
    if let Some(at) = first {
        events.insert(at, Event::Html(CowStr::from(toc_html(&entries))));
    }
}

fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

fn toc_html(entries: &[TocEntry]) -> String {
    html! {
        ol id="toc" {
            @for entry in entries {
                li class=(format!("toc-h{}", entry.level)) {
                    a href=(format!("#{}", entry.id)) { (entry.text) }
                }
            }
        }
    }
    .into_string()
}

/// Lowercase alphanumerics joined by single dashes.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut gap = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            gap = true;
        }
    }
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn unique_slug(text: &str, used: &HashSet<String>) -> String {
    let base = slugify(text);
    if !used.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(base)
}
