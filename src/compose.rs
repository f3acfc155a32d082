use crate::document::{BlockKind, Document};
use crate::error::Result;
use crate::heading::{TITLE_ANCHOR, block_anchor, heading_anchor};
use crate::markdown::MarkdownRenderer;
use crate::types::PageSetup;
use regex::{Captures, Regex};
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

static HEADING_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h([1-6])>(.*?)</h([1-6])>").expect("valid regex"));
static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

const STYLESHEET: &str = r#"
body {
    font-family: 'Segoe UI', Arial, sans-serif;
    font-size: 11pt;
    line-height: 1.6;
    color: #333;
    margin: 0;
    padding: 20px;
    background: white;
}
h1, h2, h3, h4, h5, h6 {
    color: #1e3a8a;
    margin-top: 1.5rem;
    margin-bottom: 1rem;
}
h1 { border-bottom: 2px solid #ddd; padding-bottom: 0.5rem; }
h2, h3 { border-bottom: 1px solid #eee; padding-bottom: 0.3rem; }
h1.doc-title { text-align: center; margin-bottom: 30px; }
blockquote {
    border-left: 4px solid #007bff;
    margin: 1rem 0;
    padding: 0.5rem 1rem;
    background-color: #f8f9fa;
    font-style: italic;
    color: #6c757d;
}
table { width: 100%; border-collapse: collapse; margin: 1rem 0; font-size: 0.9rem; }
table th, table td { border: 1px solid #ddd; padding: 8px 12px; text-align: left; }
table th { background-color: #f8f9fa; font-weight: bold; color: #495057; }
table tr:nth-child(even) { background-color: #f8f9fa; }
pre {
    background: #f8f9fa;
    border: 1px solid #e9ecef;
    border-radius: 4px;
    padding: 1rem;
    font-family: 'Courier New', monospace;
    font-size: 0.9rem;
    white-space: pre-wrap;
}
code {
    background: #f8f9fa;
    padding: 0.2rem 0.4rem;
    border-radius: 3px;
    font-family: 'Courier New', monospace;
    font-size: 0.9rem;
    color: #e83e8c;
}
pre code { background: none; padding: 0; color: inherit; }
ul, ol { margin: 1rem 0; padding-left: 2rem; }
li { margin: 0.5rem 0; }
p { margin-bottom: 1rem; text-align: justify; }
"#;

/// Builds the single HTML document handed to the PDF engine.
///
/// Anchor ids:
/// - document title: `title-bookmark`
/// - block title: `block-<n>`, `n` counting emitted blocks from 1
/// - markdown headings: `heading-<n>-<slug>`
#[derive(Clone)]
pub struct HtmlComposer {
    markdown: Arc<dyn MarkdownRenderer>,
    page: PageSetup,
}

impl HtmlComposer {
    pub fn new(markdown: Arc<dyn MarkdownRenderer>, page: PageSetup) -> Self {
        Self { markdown, page }
    }

    pub fn compose(&self, document: &Document) -> Result<String> {
        let body = self.compose_body(document)?;
        let title = html_escape::encode_text(document.title.trim());
        Ok(format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>{title}</title>\n<style>\n@page {{ size: {size}; margin: {margin}; }}\n\
             {STYLESHEET}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
            size = self.page.size.css_value(),
            margin = self.page.margins.css_value(),
        ))
    }

    /// Body markup only, without the surrounding document and stylesheet.
    pub fn compose_body(&self, document: &Document) -> Result<String> {
        let mut out = String::new();

        if document.has_title() {
            let _ = writeln!(
                out,
                "<h1 id=\"{TITLE_ANCHOR}\" class=\"doc-title\">{}</h1>",
                html_escape::encode_text(&document.title)
            );
        }

        for (ordinal, block) in document.emitted_blocks() {
            tracing::debug!(ordinal, kind = ?block.kind, "composing block");
            if block.has_title() {
                let _ = writeln!(
                    out,
                    "<h2 id=\"{}\" class=\"block-title\">{}</h2>",
                    block_anchor(ordinal),
                    html_escape::encode_text(&block.title)
                );
            }

            match block.kind {
                BlockKind::Markdown if block.has_content() => {
                    let rendered = self.markdown.render(&block.content)?;
                    out.push_str(&inject_heading_anchors(&rendered, ordinal));
                    out.push('\n');
                }
                BlockKind::Code if block.has_content() => {
                    let _ = writeln!(
                        out,
                        "<pre><code>{}</code></pre>",
                        html_escape::encode_text(&block.content)
                    );
                }
                _ => {}
            }
        }

        Ok(out)
    }
}

/// Add `id="heading-<ordinal>-<slug>"` to every bare `<h1>`..`<h6>` element.
///
/// Headings that already carry attributes, or whose closing tag does not match, are left
/// as they are.
pub fn inject_heading_anchors(html: &str, ordinal: usize) -> String {
    HEADING_TAG_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let level = &caps[1];
            if level != &caps[3] {
                return caps[0].to_string();
            }
            let inner = &caps[2];
            let id = heading_anchor(ordinal, &heading_plain_text(inner));
            format!("<h{level} id=\"{id}\">{inner}</h{level}>")
        })
        .into_owned()
}

fn heading_plain_text(inner_html: &str) -> String {
    let without_tags = INLINE_TAG_RE.replace_all(inner_html, "");
    html_escape::decode_html_entities(&without_tags).into_owned()
}
