use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Filename stem used when the document has no title at all.
pub const UNTITLED_FILENAME: &str = "DocumentWithoutName";
/// Filename stem used when the title sanitizes to nothing.
pub const FALLBACK_FILENAME: &str = "document";

static FILENAME_DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid regex"));
static FILENAME_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    #[default]
    Markdown,
    Code,
    /// Any other type tag. Such blocks contribute their title only.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: BlockKind,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
}

impl Block {
    pub fn markdown(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Markdown,
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn code(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Code,
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Blocks with neither title nor content produce no HTML and no bookmark.
    pub fn is_empty(&self) -> bool {
        !self.has_title() && !self.has_content()
    }
}

/// The input document: an optional title and an ordered list of blocks.
///
/// Missing or `null` fields deserialize to their defaults, so any JSON object is a valid
/// document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_slice(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json_slice(&data)
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Non-empty blocks paired with their 1-based ordinal among emitted blocks.
    pub fn emitted_blocks(&self) -> impl Iterator<Item = (usize, &Block)> {
        self.blocks
            .iter()
            .filter(|block| !block.is_empty())
            .enumerate()
            .map(|(idx, block)| (idx + 1, block))
    }

    pub fn download_filename(&self) -> String {
        download_filename(&self.title)
    }

    /// Small fixed document that exercises a title, a block title and two heading levels.
    pub fn selftest() -> Self {
        Document::new("Debug Test PDF").with_block(Block::markdown(
            "Test Block",
            "# Test Heading\n\nThis is a test paragraph for debugging PDF generation.\n\n\
             ## Subheading\n\nAnother paragraph with **bold** and *italic* text.",
        ))
    }
}

/// Strip characters outside `[A-Za-z0-9_\s-]`, trim, then collapse runs of hyphens and
/// whitespace into a single underscore.
pub fn sanitize_filename_base(title: &str) -> String {
    let stripped = FILENAME_DISALLOWED_RE.replace_all(title, "");
    FILENAME_SEPARATOR_RE
        .replace_all(stripped.trim(), "_")
        .into_owned()
}

/// Attachment filename for a rendered document, e.g. `"Q&A: 2024!!"` → `QA_2024.pdf`.
pub fn download_filename(title: &str) -> String {
    let title = title.trim();
    let title = if title.is_empty() {
        UNTITLED_FILENAME
    } else {
        title
    };
    let base = sanitize_filename_base(title);
    if base.is_empty() {
        format!("{FALLBACK_FILENAME}.pdf")
    } else {
        format!("{base}.pdf")
    }
}

/// Download filenames for a batch. A stem already taken earlier in the batch (compared
/// case-insensitively) gets `-2`, `-3`, ... appended so no two documents share a file.
pub fn unique_download_filenames(documents: &[Document]) -> Vec<String> {
    let mut taken = HashSet::new();
    documents
        .iter()
        .map(|document| {
            let name = document.download_filename();
            let stem = name.strip_suffix(".pdf").unwrap_or(&name).to_string();
            let mut candidate = name;
            let mut suffix = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{stem}-{suffix}.pdf");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
