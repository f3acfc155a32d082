use crate::DocPressBuilder;
use crate::error::Result;
use crate::renderer::RendererBackend;
use crate::types::Margins;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// YAML render settings. Every field is optional; absent fields keep the builder's value.
///
/// ```yaml
/// backend: wkhtmltopdf
/// binary: /usr/local/bin/wkhtmltopdf
/// timeout_secs: 60
/// margins_cm: { top: 1.0, right: 2.0, bottom: 2.0, left: 2.0 }
/// bookmarks: true
/// keep_html: ./html-debug
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: Option<RendererBackend>,
    #[serde(default)]
    pub binary: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub margins_cm: Option<MarginsCm>,
    #[serde(default)]
    pub bookmarks: Option<bool>,
    #[serde(default)]
    pub keep_html: Option<PathBuf>,
}

/// Margins in centimetres. Missing edges take the default layout (0.5 top, 2 elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarginsCm {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for MarginsCm {
    fn default() -> Self {
        Self {
            top: 0.5,
            right: 2.0,
            bottom: 2.0,
            left: 2.0,
        }
    }
}

impl From<MarginsCm> for Margins {
    fn from(cm: MarginsCm) -> Self {
        Margins::from_cm(cm.top, cm.right, cm.bottom, cm.left)
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay the configured fields onto `builder`.
    pub fn apply(&self, mut builder: DocPressBuilder) -> DocPressBuilder {
        if let Some(backend) = self.backend {
            builder = builder.backend(backend);
        }
        if let Some(binary) = &self.binary {
            builder = builder.renderer_binary(binary);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.render_timeout(Duration::from_secs(secs));
        }
        if let Some(margins) = self.margins_cm {
            builder = builder.margins(margins.into());
        }
        if let Some(bookmarks) = self.bookmarks {
            builder = builder.bookmarks(bookmarks);
        }
        if let Some(dir) = &self.keep_html {
            builder = builder.keep_html(dir);
        }
        builder
    }
}
