use crate::chromium::read_engine_output;
use crate::error::{DocPressError, Result};
use crate::process::run_engine;
use crate::renderer::{PdfRenderer, discover_binary};
use crate::types::PageSetup;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub const WKHTMLTOPDF_ENV: &str = "DOCPRESS_WKHTMLTOPDF";

const CANDIDATES: &[&str] = &["wkhtmltopdf"];

const MM_PER_PT: f32 = 25.4 / 72.0;

/// The `wkhtmltopdf` binary. Unlike Chromium it ignores `@page`, so geometry is passed on
/// the command line.
#[derive(Debug, Clone)]
pub struct WkhtmltopdfRenderer {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl WkhtmltopdfRenderer {
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        discover_binary(self.binary.as_deref(), WKHTMLTOPDF_ENV, CANDIDATES).ok_or_else(|| {
            DocPressError::RendererUnavailable {
                engine: self.name(),
                message: format!("wkhtmltopdf not found; set {WKHTMLTOPDF_ENV} or add it to PATH"),
            }
        })
    }

    fn command(&self, binary: &Path, page: &PageSetup, html_path: &Path, pdf_path: &Path) -> Command {
        let mut command = Command::new(binary);
        command.arg("--quiet").arg("--encoding").arg("UTF-8");
        if page.size.is_a4() {
            command.arg("--page-size").arg("A4");
        } else {
            command
                .arg("--page-width")
                .arg(mm(page.size.width))
                .arg("--page-height")
                .arg(mm(page.size.height));
        }
        command
            .arg("--margin-top")
            .arg(mm(page.margins.top))
            .arg("--margin-right")
            .arg(mm(page.margins.right))
            .arg("--margin-bottom")
            .arg(mm(page.margins.bottom))
            .arg("--margin-left")
            .arg(mm(page.margins.left))
            .arg("--no-outline")
            .arg("--enable-local-file-access")
            .arg(html_path)
            .arg(pdf_path);
        command
    }
}

impl PdfRenderer for WkhtmltopdfRenderer {
    fn name(&self) -> &'static str {
        "wkhtmltopdf"
    }

    fn render(&self, html: &str, page: &PageSetup) -> Result<Vec<u8>> {
        let binary = self.resolve_binary()?;
        let workdir = tempfile::Builder::new().prefix("docpress-wkhtml").tempdir()?;
        let html_path = workdir.path().join("document.html");
        let pdf_path = workdir.path().join("document.pdf");
        std::fs::write(&html_path, html)?;

        tracing::info!(binary = %binary.display(), "launching wkhtmltopdf");
        let finished = run_engine(
            self.name(),
            &mut self.command(&binary, page, &html_path, &pdf_path),
            self.timeout,
        )?;
        if !finished.stderr.is_empty() {
            tracing::debug!(stderr = %finished.stderr, "wkhtmltopdf output");
        }
        read_engine_output(self.name(), &pdf_path)
    }
}

fn mm(points: f32) -> String {
    format!("{:.1}mm", points * MM_PER_PT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Margins, Size};

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn a4_geometry_uses_named_size_and_mm_margins() {
        let renderer = WkhtmltopdfRenderer::new(None, Duration::from_secs(5));
        let command = renderer.command(
            Path::new("wkhtmltopdf"),
            &PageSetup::default(),
            Path::new("in.html"),
            Path::new("out.pdf"),
        );
        let args = args(&command);
        let joined = args.join(" ");
        assert!(joined.contains("--page-size A4"));
        assert!(joined.contains("--margin-top 5.0mm"));
        assert!(joined.contains("--margin-left 20.0mm"));
        assert!(joined.contains("--no-outline"));
        assert_eq!(&args[args.len() - 2..], ["in.html", "out.pdf"]);
    }

    #[test]
    fn custom_sizes_are_passed_explicitly() {
        let renderer = WkhtmltopdfRenderer::new(None, Duration::from_secs(5));
        let page = PageSetup {
            size: Size::letter(),
            margins: Margins::all(72.0),
        };
        let command = renderer.command(
            Path::new("wkhtmltopdf"),
            &page,
            Path::new("in.html"),
            Path::new("out.pdf"),
        );
        let joined = args(&command).join(" ");
        assert!(joined.contains("--page-width 215.9mm --page-height 279.4mm"));
        assert!(joined.contains("--margin-bottom 25.4mm"));
        assert!(!joined.contains("--page-size"));
    }
}
