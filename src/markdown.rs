use crate::error::Result;
use pulldown_cmark::{Options, Parser, html};

/// Markdown → HTML conversion used for markdown blocks.
///
/// Implementations must emit standard `<h1>`..`<h6>` heading tags and support tables and
/// fenced code blocks.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String>;
}

/// CommonMark renderer backed by `pulldown-cmark`, with the table and strikethrough
/// extensions enabled. Fenced code is part of CommonMark itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkRenderer;

impl CommonMarkRenderer {
    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}
