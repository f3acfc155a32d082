mod chromium;
mod compose;
mod config;
mod document;
mod error;
mod fallback;
mod heading;
mod markdown;
mod normalize;
mod outline;
mod pdfinspect;
mod perf;
mod process;
mod renderer;
mod textpdf;
mod types;
mod wkhtmltopdf;

pub use chromium::{CHROMIUM_ENV, ChromiumRenderer};
pub use compose::{HtmlComposer, inject_heading_anchors};
pub use config::{ConfigFile, MarginsCm};
pub use document::{
    Block, BlockKind, Document, FALLBACK_FILENAME, PDF_CONTENT_TYPE, UNTITLED_FILENAME,
    download_filename, sanitize_filename_base, unique_download_filenames,
};
pub use error::{DocPressError, Result};
pub use fallback::{ERROR_PAGE_TITLE, MINIMAL_PDF, error_page_html};
pub use heading::{
    BLOCK_TITLE_LEVEL, MarkdownHeading, TITLE_ANCHOR, TITLE_LEVEL, block_anchor, heading_anchor,
    markdown_headings, slugify, strip_label_markers,
};
pub use markdown::{CommonMarkRenderer, MarkdownRenderer};
pub use normalize::normalize_heading_text;
pub use outline::{OutlineEntry, OutlinePlan, synthesize, write_outline};
pub use pdfinspect::{
    OutlineItem, PdfInspectError, PdfInspectErrorCode, PdfInspectReport, decode_text_string,
    inspect_pdf_bytes, inspect_pdf_path, require_readable_outline,
};
pub use renderer::{DEFAULT_RENDER_TIMEOUT, PdfRenderer, RendererBackend, discover_binary};
pub use textpdf::{TextBlock, TextPdfRenderer, TextStyle, html_to_blocks, winansi_bytes};
pub use types::{Margins, PT_PER_CM, PageSetup, Size};
pub use wkhtmltopdf::{WKHTMLTOPDF_ENV, WkhtmltopdfRenderer};

use perf::PerfLogger;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Content type of every rendered document.
pub fn content_type() -> &'static str {
    PDF_CONTENT_TYPE
}

/// Which stage of the fallback chain produced a [`RenderOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// Composed, rendered and (when enabled) bookmarked.
    Full,
    /// The error page drawn by the fallback renderer.
    ErrorPage,
    /// [`MINIMAL_PDF`].
    Minimal,
}

impl RenderPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderPath::Full => "full",
            RenderPath::ErrorPage => "error-page",
            RenderPath::Minimal => "minimal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub bytes: Vec<u8>,
    pub path: RenderPath,
    /// Lower-case hex SHA-256 of `bytes`.
    pub sha256: String,
}

impl RenderOutcome {
    fn new(bytes: Vec<u8>, path: RenderPath) -> Self {
        let sha256 = Sha256::digest(&bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Self {
            bytes,
            path,
            sha256,
        }
    }

    pub fn is_full(&self) -> bool {
        self.path == RenderPath::Full
    }
}

/// Document → PDF pipeline: compose HTML, render it with the configured engine, then add
/// the bookmark outline. Rendering never fails outright; see [`DocPress::render`].
pub struct DocPress {
    composer: HtmlComposer,
    renderer: Arc<dyn PdfRenderer>,
    fallback: Arc<dyn PdfRenderer>,
    page: PageSetup,
    bookmarks: bool,
    keep_html: Option<PathBuf>,
    perf: Option<Arc<PerfLogger>>,
}

#[derive(Clone)]
pub struct DocPressBuilder {
    backend: RendererBackend,
    binary: Option<PathBuf>,
    page_size: Size,
    margins: Margins,
    render_timeout: Duration,
    markdown: Arc<dyn MarkdownRenderer>,
    renderer: Option<Arc<dyn PdfRenderer>>,
    fallback: Option<Arc<dyn PdfRenderer>>,
    bookmarks: bool,
    keep_html: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl DocPress {
    pub fn builder() -> DocPressBuilder {
        DocPressBuilder::new()
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn page_setup(&self) -> PageSetup {
        self.page
    }

    /// Render `document`, falling back to an error page and then to [`MINIMAL_PDF`].
    ///
    /// The returned bytes are always a PDF; [`RenderOutcome::path`] says which stage made
    /// them.
    #[tracing::instrument(skip_all, fields(title = %document.title, blocks = document.blocks.len()))]
    pub fn render(&self, document: &Document) -> RenderOutcome {
        self.render_indexed(document, None, &document.download_filename())
    }

    /// Render without the fallback chain, surfacing the first error.
    pub fn try_render(&self, document: &Document) -> Result<Vec<u8>> {
        self.try_render_indexed(document, None, &document.download_filename())
    }

    /// Render independent documents on the rayon pool. Results keep input order.
    ///
    /// Saved HTML is named after [`unique_download_filenames`], so documents sharing a
    /// title do not overwrite each other.
    pub fn render_many(&self, documents: &[Document]) -> Vec<RenderOutcome> {
        tracing::info!(documents = documents.len(), "batch render");
        let names = unique_download_filenames(documents);
        documents
            .par_iter()
            .zip(names.par_iter())
            .enumerate()
            .map(|(idx, (document, name))| self.render_indexed(document, Some(idx), name))
            .collect()
    }

    /// The HTML that would be handed to the render engine.
    pub fn compose_html(&self, document: &Document) -> Result<String> {
        self.composer.compose(document)
    }

    fn render_indexed(
        &self,
        document: &Document,
        doc_id: Option<usize>,
        file_name: &str,
    ) -> RenderOutcome {
        let outcome = match self.try_render_indexed(document, doc_id, file_name) {
            Ok(bytes) => RenderOutcome::new(bytes, RenderPath::Full),
            Err(error) => {
                tracing::error!(
                    %error,
                    engine = self.renderer.name(),
                    title = %document.title,
                    "pdf generation failed; drawing error page"
                );
                self.fallback_outcome(&error)
            }
        };
        if let Some(perf) = self.perf.as_deref() {
            perf.log_counts(
                "document",
                doc_id,
                &[
                    ("bytes", outcome.bytes.len() as u64),
                    ("fallback", u64::from(!outcome.is_full())),
                ],
            );
            perf.flush();
        }
        outcome
    }

    fn try_render_indexed(
        &self,
        document: &Document,
        doc_id: Option<usize>,
        file_name: &str,
    ) -> Result<Vec<u8>> {
        tracing::info!(title = %document.title, blocks = document.blocks.len(), "composing html");
        let html = self.timed("compose", doc_id, || self.composer.compose(document))?;
        if let Some(dir) = self.keep_html.as_deref() {
            write_debug_html(dir, file_name, &html);
        }

        tracing::info!(engine = self.renderer.name(), html_bytes = html.len(), "rendering pdf");
        let pdf = self.timed("render", doc_id, || self.renderer.render(&html, &self.page))?;
        if pdf.is_empty() {
            return Err(DocPressError::EmptyOutput {
                engine: self.renderer.name(),
            });
        }
        tracing::info!(bytes = pdf.len(), "pdf rendered");

        if !self.bookmarks {
            return Ok(pdf);
        }
        Ok(self.timed("outline", doc_id, || outline::synthesize(&pdf, document)))
    }

    fn fallback_outcome(&self, error: &DocPressError) -> RenderOutcome {
        let html = error_page_html(&error.to_string(), chrono::Local::now());
        match self.fallback.render(&html, &self.page) {
            Ok(bytes) if !bytes.is_empty() => RenderOutcome::new(bytes, RenderPath::ErrorPage),
            Ok(_) => {
                tracing::error!(
                    engine = self.fallback.name(),
                    "error page was empty; returning minimal pdf"
                );
                RenderOutcome::new(MINIMAL_PDF.to_vec(), RenderPath::Minimal)
            }
            Err(fallback_error) => {
                tracing::error!(
                    error = %fallback_error,
                    engine = self.fallback.name(),
                    "error page failed; returning minimal pdf"
                );
                RenderOutcome::new(MINIMAL_PDF.to_vec(), RenderPath::Minimal)
            }
        }
    }

    fn timed<T>(&self, stage: &str, doc_id: Option<usize>, f: impl FnOnce() -> T) -> T {
        match self.perf.as_deref() {
            Some(perf) => perf.time(stage, doc_id, f),
            None => f(),
        }
    }
}

fn write_debug_html(dir: &Path, file_name: &str, html: &str) {
    let stem = file_name.strip_suffix(".pdf").unwrap_or(file_name);
    let path = dir.join(format!("{stem}.html"));
    match std::fs::write(&path, html) {
        Ok(()) => tracing::info!(path = %path.display(), "composed html saved"),
        Err(error) => tracing::warn!(%error, path = %path.display(), "could not save composed html"),
    }
}

impl Default for DocPressBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocPressBuilder {
    pub fn new() -> Self {
        Self {
            backend: RendererBackend::default(),
            binary: None,
            page_size: Size::a4(),
            margins: Margins::default(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            markdown: Arc::new(CommonMarkRenderer),
            renderer: None,
            fallback: None,
            bookmarks: true,
            keep_html: None,
            perf_path: None,
        }
    }

    pub fn backend(mut self, backend: RendererBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Explicit engine binary, overriding environment and `PATH` discovery.
    pub fn renderer_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn markdown_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = renderer;
        self
    }

    /// Custom engine; takes precedence over [`backend`](Self::backend).
    pub fn renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Engine used to draw the error page. Defaults to [`TextPdfRenderer`].
    pub fn fallback_renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.fallback = Some(renderer);
        self
    }

    pub fn bookmarks(mut self, enabled: bool) -> Self {
        self.bookmarks = enabled;
        self
    }

    /// Save each composed HTML document as `<dir>/<filename stem>.html`.
    pub fn keep_html(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keep_html = Some(dir.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DocPress> {
        if self.render_timeout.is_zero() {
            return Err(DocPressError::InvalidConfiguration(
                "render_timeout must be greater than zero".to_string(),
            ));
        }
        let size_ok = [self.page_size.width, self.page_size.height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !size_ok {
            return Err(DocPressError::InvalidConfiguration(format!(
                "invalid page size {}x{}",
                self.page_size.width, self.page_size.height
            )));
        }
        if !self.margins.is_valid_for(self.page_size) {
            return Err(DocPressError::InvalidConfiguration(
                "margins must be non-negative and leave a printable area".to_string(),
            ));
        }
        if let Some(dir) = &self.keep_html {
            std::fs::create_dir_all(dir)?;
        }
        let perf = match self.perf_path {
            Some(path) => Some(Arc::new(PerfLogger::new(path)?)),
            None => None,
        };

        let page = PageSetup {
            size: self.page_size,
            margins: self.margins,
        };
        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => self.backend.create(self.binary, self.render_timeout),
        };
        tracing::debug!(engine = renderer.name(), bookmarks = self.bookmarks, "docpress configured");
        Ok(DocPress {
            composer: HtmlComposer::new(self.markdown, page),
            renderer,
            fallback: self
                .fallback
                .unwrap_or_else(|| Arc::new(TextPdfRenderer::new())),
            page,
            bookmarks: self.bookmarks,
            keep_html: self.keep_html,
            perf,
        })
    }
}
