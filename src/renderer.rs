use crate::chromium::ChromiumRenderer;
use crate::error::Result;
use crate::textpdf::TextPdfRenderer;
use crate::types::PageSetup;
use crate::wkhtmltopdf::WkhtmltopdfRenderer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// HTML → PDF conversion engine.
pub trait PdfRenderer: Send + Sync {
    /// Short engine name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Render a complete HTML document to PDF bytes using the given page geometry.
    fn render(&self, html: &str, page: &PageSetup) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum RendererBackend {
    /// Headless Chromium / Chrome `--print-to-pdf`.
    #[default]
    Chromium,
    /// The `wkhtmltopdf` binary.
    Wkhtmltopdf,
    /// Built-in plain-text renderer; needs no external binary.
    Text,
}

impl RendererBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererBackend::Chromium => "chromium",
            RendererBackend::Wkhtmltopdf => "wkhtmltopdf",
            RendererBackend::Text => "text",
        }
    }

    pub fn create(&self, binary: Option<PathBuf>, timeout: Duration) -> Arc<dyn PdfRenderer> {
        match self {
            RendererBackend::Chromium => Arc::new(ChromiumRenderer::new(binary, timeout)),
            RendererBackend::Wkhtmltopdf => Arc::new(WkhtmltopdfRenderer::new(binary, timeout)),
            RendererBackend::Text => Arc::new(TextPdfRenderer::new()),
        }
    }
}

/// Locate an engine binary: explicit path, then `env_var`, then the first candidate name
/// found on `PATH`.
pub fn discover_binary(explicit: Option<&Path>, env_var: &str, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    let search_path = std::env::var_os("PATH")?;
    find_in_dirs(std::env::split_paths(&search_path), candidates)
}

fn find_in_dirs(dirs: impl Iterator<Item = PathBuf>, candidates: &[&str]) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = dirs.collect();
    for name in candidates {
        for dir in &dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{name}.exe"));
                if exe.is_file() {
                    return Some(exe);
                }
            }
        }
    }
    None
}
