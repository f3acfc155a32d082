//! Heading detection and anchor ids shared by the HTML composer and the outline pass.
//!
//! The HTML anchors and the bookmark tree must agree on levels and ids.

/// Anchor id of the document title heading.
pub const TITLE_ANCHOR: &str = "title-bookmark";

/// Outline level of the document title.
pub const TITLE_LEVEL: usize = 1;
/// Outline level of a block title.
pub const BLOCK_TITLE_LEVEL: usize = 2;

/// A `#`-prefixed line found in markdown block content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownHeading<'a> {
    /// Number of leading `#` characters. Not capped at 6.
    pub raw_level: usize,
    /// Text after the markers, trimmed.
    pub text: &'a str,
}

impl MarkdownHeading<'_> {
    /// Outline level: `#` maps below the title (1) and block titles (2).
    pub fn outline_level(&self) -> usize {
        self.raw_level + BLOCK_TITLE_LEVEL
    }

    pub fn label(&self) -> String {
        strip_label_markers(self.text)
    }
}

/// Scan markdown source line by line for headings.
///
/// Detection is purely textual: any trimmed line starting with `#` counts, including lines
/// inside fenced code blocks. Lines with nothing after the markers are skipped.
pub fn markdown_headings(content: &str) -> impl Iterator<Item = MarkdownHeading<'_>> {
    content.split('\n').filter_map(|line| {
        let line = line.trim();
        if !line.starts_with('#') {
            return None;
        }
        let raw_level = line.bytes().take_while(|b| *b == b'#').count();
        let text = line[raw_level..].trim();
        if text.is_empty() {
            return None;
        }
        Some(MarkdownHeading { raw_level, text })
    })
}

/// Minimal label cleanup used for in-content headings: drops `**`, `*` and backticks.
///
/// [`normalize_heading_text`](crate::normalize_heading_text) is the complete cleaner.
pub fn strip_label_markers(text: &str) -> String {
    text.replace("**", "").replace(['*', '`'], "")
}

pub fn block_anchor(ordinal: usize) -> String {
    format!("block-{ordinal}")
}

pub fn heading_anchor(ordinal: usize, heading_text: &str) -> String {
    format!("heading-{ordinal}-{}", slugify(heading_text))
}

/// Lower-case ASCII slug: every run of non-alphanumeric characters becomes one hyphen,
/// and hyphens are trimmed from both ends.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
