//! Markdown to gemtext.
//!
//! Gemtext is line-oriented: no inline markup, one link per line, three
//! heading levels. The conversion walks `pulldown-cmark` events and
//! flattens them:
//!
//! | Markdown | Gemtext |
//! |---|---|
//! | `#`..`######` heading | `#`, `##`, `###` (deeper levels clamp to 3) |
//! | paragraph | one line; soft breaks become spaces |
//! | link, image | label kept inline, `=> url label` after the block |
//! | list item | `* item` (task items keep `[x]` / `[ ]`) |
//! | block quote | `> line` |
//! | code block | fenced with ```` ``` ````, language kept as alt text |
//! | table row | cells joined by ` | ` |
//! | raw HTML | dropped |
//!
//! A paragraph holding nothing but one link or image collapses to its
//! `=>` line. Blocks are separated by one blank line.

use crate::metadata::Metadata;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use std::mem;

const FENCE: &str = "```";

/// A gemtext page for a Markdown body, titled when the document has a title.
pub(super) fn markdown_page(meta: &Metadata, body: &str) -> String {
    let converted = from_markdown(body);
    match meta.title.as_deref() {
        Some(title) if !title.trim().is_empty() => format!("# {}\n\n{converted}", title.trim()),
        _ => converted,
    }
}

/// Convert a Markdown body to gemtext.
pub(super) fn from_markdown(body: &str) -> String {
    let mut writer = GemtextWriter::default();
    for event in Parser::new_ext(body, super::html::markdown_options()) {
        writer.event(event);
    }
    writer.finish()
}

#[derive(Debug, Default)]
struct GemtextWriter {
    blocks: Vec<String>,
    lines: Vec<String>,
    line: String,
    /// Links collected in the current block, emitted after it.
    links: Vec<(String, String)>,
    /// Open links: destination and the label's start offset in `line`.
    open_links: Vec<(String, usize)>,
    /// `links.len()` when the current paragraph started.
    paragraph_links: usize,
    cells: Vec<String>,
    code: Option<String>,
    quote_depth: usize,
    list_depth: usize,
}

impl GemtextWriter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.code {
                Some(code) => code.push_str(&text),
                None => self.line.push_str(&text),
            },
            Event::Code(code) => self.line.push_str(&code),
            Event::SoftBreak => self.line.push(' '),
            Event::HardBreak => self.emit_line(),
            Event::TaskListMarker(done) => self.line.push_str(if done { "[x] " } else { "[ ] " }),
            Event::FootnoteReference(label) => {
                self.line.push_str(&format!("[{label}]"));
            }
            Event::Rule => self.end_block(),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.paragraph_links = self.links.len(),
            Tag::Heading { level, .. } => {
                let depth = (level as usize).min(3);
                self.line = format!("{} ", "#".repeat(depth));
            }
            Tag::BlockQuote(_) => self.quote_depth += 1,
            Tag::List(_) => {
                self.flush_line();
                self.list_depth += 1;
            }
            Tag::Item => self.line = "* ".to_string(),
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.lines.push(format!("{FENCE}{lang}"));
                self.code = Some(String::new());
            }
            Tag::FootnoteDefinition(label) => self.line = format!("[{label}] "),
            Tag::TableHead | Tag::TableRow => self.cells.clear(),
            Tag::TableCell => self.line.clear(),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.open_links.push((dest_url.to_string(), self.line.len()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.is_lone_link() {
                    self.line.clear();
                } else {
                    self.emit_line();
                }
                if !self.is_nested() {
                    self.end_block();
                }
            }
            TagEnd::Heading(_) => {
                self.emit_line();
                self.end_block();
            }
            TagEnd::BlockQuote(_) => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if !self.is_nested() {
                    self.end_block();
                }
            }
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if !self.is_nested() {
                    self.end_block();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let code = code.strip_suffix('\n').unwrap_or(&code);
                    if !code.is_empty() {
                        self.lines.extend(code.split('\n').map(str::to_string));
                    }
                }
                self.lines.push(FENCE.to_string());
                if !self.is_nested() {
                    self.end_block();
                }
            }
            TagEnd::FootnoteDefinition | TagEnd::Table => self.end_block(),
            TagEnd::TableCell => self.cells.push(mem::take(&mut self.line).trim().to_string()),
            TagEnd::TableHead | TagEnd::TableRow => {
                let row = mem::take(&mut self.cells).join(" | ");
                self.lines.push(row);
            }
            TagEnd::Link | TagEnd::Image => {
                if let Some((url, start)) = self.open_links.pop() {
                    let label = self.line.get(start..).unwrap_or_default().trim().to_string();
                    self.links.push((url, label));
                }
            }
            _ => {}
        }
    }

    fn is_nested(&self) -> bool {
        self.list_depth > 0 || self.quote_depth > 0
    }

    /// The paragraph being closed is exactly one link and nothing else.
    fn is_lone_link(&self) -> bool {
        match &self.links[self.paragraph_links..] {
            [(_, label)] => self.line.trim() == label.as_str(),
            _ => false,
        }
    }

    fn flush_line(&mut self) {
        if !self.line.trim().is_empty() && self.line.trim() != "*" {
            self.emit_line();
        }
        self.line.clear();
    }

    fn emit_line(&mut self) {
        let text = mem::take(&mut self.line);
        let text = text.trim_end();
        if self.quote_depth > 0 {
            self.lines.push(format!("> {text}"));
        } else {
            self.lines.push(text.to_string());
        }
    }

    fn end_block(&mut self) {
        self.flush_line();
        if self.lines.is_empty() && self.links.is_empty() {
            return;
        }
        let mut block = mem::take(&mut self.lines);
        for (url, label) in self.links.drain(..) {
            if label.is_empty() {
                block.push(format!("=> {url}"));
            } else {
                block.push(format!("=> {url} {label}"));
            }
        }
        self.paragraph_links = 0;
        self.blocks.push(block.join("\n"));
    }

    fn finish(mut self) -> String {
        self.end_block();
        if self.blocks.is_empty() {
            return String::new();
        }
        let mut out = self.blocks.join("\n\n");
        out.push('\n');
        out
    }
}
