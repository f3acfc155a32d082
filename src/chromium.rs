use crate::error::{DocPressError, Result};
use crate::process::run_engine;
use crate::renderer::{PdfRenderer, discover_binary};
use crate::types::PageSetup;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub const CHROMIUM_ENV: &str = "DOCPRESS_CHROMIUM";

const CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

// Share of the timeout Chromium may spend waiting for the page to settle before printing.
const LOAD_BUDGET_PERCENT: u128 = 80;

/// Headless Chromium `--print-to-pdf`. Page size and margins come from the document's
/// `@page` rule, which Chromium honours when printing.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        discover_binary(self.binary.as_deref(), CHROMIUM_ENV, CANDIDATES).ok_or_else(|| {
            DocPressError::RendererUnavailable {
                engine: self.name(),
                message: format!("no browser found; set {CHROMIUM_ENV} or install chromium"),
            }
        })
    }

    fn command(&self, binary: &Path, html_path: &Path, pdf_path: &Path) -> Command {
        let budget_ms = self.timeout.as_millis() * LOAD_BUDGET_PERCENT / 100;
        let mut command = Command::new(binary);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--run-all-compositor-stages-before-draw")
            .arg("--no-pdf-header-footer")
            .arg(format!("--virtual-time-budget={budget_ms}"))
            .arg(format!("--print-to-pdf={}", pdf_path.display()))
            .arg(file_url(html_path));
        command
    }
}

impl PdfRenderer for ChromiumRenderer {
    fn name(&self) -> &'static str {
        "chromium"
    }

    fn render(&self, html: &str, _page: &PageSetup) -> Result<Vec<u8>> {
        let binary = self.resolve_binary()?;
        let workdir = tempfile::Builder::new().prefix("docpress-chromium").tempdir()?;
        let html_path = workdir.path().join("document.html");
        let pdf_path = workdir.path().join("document.pdf");
        std::fs::write(&html_path, html)?;

        tracing::info!(binary = %binary.display(), "launching chromium");
        let finished = run_engine(
            self.name(),
            &mut self.command(&binary, &html_path, &pdf_path),
            self.timeout,
        )?;
        if !finished.stderr.is_empty() {
            tracing::debug!(stderr = %finished.stderr, "chromium output");
        }
        read_engine_output(self.name(), &pdf_path)
    }
}

/// Read the PDF an engine wrote; a missing or zero-byte file is an empty render.
pub(crate) fn read_engine_output(engine: &'static str, path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(DocPressError::EmptyOutput { engine }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(DocPressError::EmptyOutput { engine })
        }
        Err(err) => Err(err.into()),
    }
}

fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}
