//! Bookmark outline synthesis.
//!
//! The tree is planned from the [`Document`] alone, then written into the rendered PDF's
//! catalog. Every bookmark targets the first page: the render engines do not report where
//! an anchor landed.

use crate::document::{BlockKind, Document};
use crate::error::{DocPressError, Result};
use crate::heading::{BLOCK_TITLE_LEVEL, TITLE_LEVEL, markdown_headings};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, StringFormat, dictionary};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub label: String,
    pub level: usize,
    /// Index of the parent entry in [`OutlinePlan::entries`]; `None` for roots.
    pub parent: Option<usize>,
}

/// Bookmark forest in document order. Parents always precede their children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlinePlan {
    entries: Vec<OutlineEntry>,
}

/// Last node inserted at each level. Sparse, since `#` depth is uncapped.
#[derive(Debug, Default)]
struct ActiveLevels {
    nodes: BTreeMap<usize, usize>,
}

impl ActiveLevels {
    /// Record `index` at `level`, forgetting deeper levels, and return its parent: the
    /// nearest shallower level still active.
    fn insert(&mut self, level: usize, index: usize) -> Option<usize> {
        self.nodes.split_off(&level);
        let parent = self.nodes.last_key_value().map(|(_, node)| *node);
        self.nodes.insert(level, index);
        parent
    }
}

impl OutlinePlan {
    pub fn from_document(document: &Document) -> Self {
        let mut plan = OutlinePlan::default();
        let mut active = ActiveLevels::default();

        if document.has_title() {
            plan.push(&mut active, document.title.clone(), TITLE_LEVEL);
        }

        for (_, block) in document.emitted_blocks() {
            if block.has_title() {
                plan.push(&mut active, block.title.clone(), BLOCK_TITLE_LEVEL);
            }
            if block.kind != BlockKind::Markdown {
                continue;
            }
            for heading in markdown_headings(&block.content) {
                let label = heading.label();
                if label.trim().is_empty() {
                    continue;
                }
                plan.push(&mut active, label, heading.outline_level());
            }
        }
        plan
    }

    fn push(&mut self, active: &mut ActiveLevels, label: String, level: usize) {
        let index = self.entries.len();
        let parent = active.insert(level, index);
        self.entries.push(OutlineEntry {
            label,
            level,
            parent,
        });
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Children of `parent` in order; `None` lists the roots.
    pub fn children(&self, parent: Option<usize>) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.parent == parent)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut cursor = self.entries.get(index).and_then(|e| e.parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.entries[parent].parent;
        }
        depth
    }

    /// Indented text rendering, two spaces per depth.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "{}{}", "  ".repeat(self.depth(idx)), entry.label);
        }
        out
    }

    // Number of open descendants per entry, as /Count expects.
    fn descendant_counts(&self) -> Vec<i64> {
        let mut counts = vec![0i64; self.entries.len()];
        for idx in (0..self.entries.len()).rev() {
            if let Some(parent) = self.entries[idx].parent {
                counts[parent] += counts[idx] + 1;
            }
        }
        counts
    }
}

/// Add the document's bookmark outline to rendered PDF bytes.
///
/// Never fails: when the PDF cannot be read or written the input is returned unchanged.
pub fn synthesize(pdf_bytes: &[u8], document: &Document) -> Vec<u8> {
    let plan = OutlinePlan::from_document(document);
    if plan.is_empty() {
        tracing::debug!("document has no headings; outline skipped");
        return pdf_bytes.to_vec();
    }
    match write_outline(pdf_bytes, &plan) {
        Ok(bytes) => {
            tracing::info!(entries = plan.len(), bytes = bytes.len(), "outline written");
            bytes
        }
        Err(error) => {
            tracing::warn!(
                %error,
                entries = plan.len(),
                bytes = pdf_bytes.len(),
                "outline synthesis failed; returning pdf unchanged"
            );
            pdf_bytes.to_vec()
        }
    }
}

/// Write `plan` as the PDF's `/Outlines` tree. Page content is left untouched.
pub fn write_outline(pdf_bytes: &[u8], plan: &OutlinePlan) -> Result<Vec<u8>> {
    let mut doc = LoDocument::load_mem(pdf_bytes)?;
    if doc.is_encrypted() {
        return Err(DocPressError::Outline("encrypted pdf".to_string()));
    }
    let first_page = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| DocPressError::Outline("pdf has no pages".to_string()))?;

    let root_id = doc.new_object_id();
    let item_ids: Vec<LoObjectId> = (0..plan.len()).map(|_| doc.new_object_id()).collect();
    let counts = plan.descendant_counts();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); plan.len()];
    let mut roots = Vec::new();
    let mut positions = Vec::with_capacity(plan.len());
    for (idx, entry) in plan.entries().iter().enumerate() {
        let siblings = match entry.parent {
            Some(parent) => &mut children[parent],
            None => &mut roots,
        };
        positions.push(siblings.len());
        siblings.push(idx);
    }

    for (idx, entry) in plan.entries().iter().enumerate() {
        let siblings = entry.parent.map_or(&roots, |parent| &children[parent]);
        let position = positions[idx];
        let mut item = dictionary! {
            "Title" => pdf_text_string(&entry.label),
            "Parent" => entry.parent.map_or(root_id, |parent| item_ids[parent]),
            "Dest" => vec![LoObject::Reference(first_page), LoObject::Name(b"Fit".to_vec())],
        };
        if position > 0 {
            item.set("Prev", item_ids[siblings[position - 1]]);
        }
        if let Some(next) = siblings.get(position + 1) {
            item.set("Next", item_ids[*next]);
        }
        if let (Some(first), Some(last)) = (children[idx].first(), children[idx].last()) {
            item.set("First", item_ids[*first]);
            item.set("Last", item_ids[*last]);
            item.set("Count", counts[idx]);
        }
        doc.objects.insert(item_ids[idx], LoObject::Dictionary(item));
    }

    let (Some(first_root), Some(last_root)) = (roots.first(), roots.last()) else {
        return Err(DocPressError::Outline("outline has no root entries".to_string()));
    };
    doc.objects.insert(
        root_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => item_ids[*first_root],
            "Last" => item_ids[*last_root],
            "Count" => plan.len() as i64,
        }),
    );

    let catalog_id = doc.trailer.get(b"Root").and_then(LoObject::as_reference)?;
    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(LoObject::as_dict_mut)?;
    catalog.set("Outlines", root_id);
    catalog.set("PageMode", "UseOutlines");

    let mut out = Vec::with_capacity(pdf_bytes.len() + plan.len() * 128);
    doc.save_to(&mut out)?;
    Ok(out)
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark otherwise.
pub(crate) fn pdf_text_string(text: &str) -> LoObject {
    if text.is_ascii() {
        return LoObject::string_literal(text);
    }
    let mut bytes = Vec::with_capacity(2 + text.len() * 2);
    bytes.extend_from_slice(&[0xFE, 0xFF]);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    LoObject::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;
    use crate::pdfinspect::inspect_pdf_bytes;
    use crate::renderer::PdfRenderer;
    use crate::textpdf::TextPdfRenderer;
    use crate::types::PageSetup;

    fn shape(plan: &OutlinePlan) -> Vec<(&str, usize, Option<usize>)> {
        plan.entries()
            .iter()
            .map(|e| (e.label.as_str(), e.level, e.parent))
            .collect()
    }

    fn rendered_pdf(paragraphs: usize) -> Vec<u8> {
        let body: String = (0..paragraphs).map(|i| format!("<p>Paragraph {i}</p>")).collect();
        TextPdfRenderer::new()
            .render(&format!("<html><body>{body}</body></html>"), &PageSetup::default())
            .expect("render fixture")
    }

    #[test]
    fn content_headings_nest_by_level() {
        let doc = Document::default().with_block(Block::markdown("", "# H1\n## H2\n# H1b"));
        let plan = OutlinePlan::from_document(&doc);
        assert_eq!(
            shape(&plan),
            vec![("H1", 3, None), ("H2", 4, Some(0)), ("H1b", 3, None)]
        );
        assert_eq!(plan.children(None), vec![0, 2]);
        assert_eq!(plan.children(Some(0)), vec![1]);
    }

    #[test]
    fn block_titles_hang_off_the_title_when_present() {
        let blocks = || {
            Document::default()
                .with_block(Block::markdown("A", ""))
                .with_block(Block::markdown("B", ""))
        };
        let untitled = OutlinePlan::from_document(&blocks());
        assert_eq!(shape(&untitled), vec![("A", 2, None), ("B", 2, None)]);

        let mut titled = blocks();
        titled.title = "Doc".to_string();
        let plan = OutlinePlan::from_document(&titled);
        assert_eq!(
            shape(&plan),
            vec![("Doc", 1, None), ("A", 2, Some(0)), ("B", 2, Some(0))]
        );
    }

    #[test]
    fn headings_attach_to_the_enclosing_block_title() {
        let doc = Document::new("T")
            .with_block(Block::markdown("Intro", "# Start\n### Deep\n## Mid"))
            .with_block(Block::markdown("", "## Orphan"))
            .with_block(Block::code("Code", "# comment, not a heading"));
        let plan = OutlinePlan::from_document(&doc);
        assert_eq!(
            shape(&plan),
            vec![
                ("T", 1, None),
                ("Intro", 2, Some(0)),
                ("Start", 3, Some(1)),
                ("Deep", 5, Some(2)),
                ("Mid", 4, Some(2)),
                ("Orphan", 4, Some(2)),
                ("Code", 2, Some(0)),
            ]
        );
        assert_eq!(
            plan.render_tree(),
            "T\n  Intro\n    Start\n      Deep\n      Mid\n      Orphan\n  Code\n"
        );
    }

    #[test]
    fn labels_use_minimal_marker_strip_and_titles_stay_verbatim() {
        let doc = Document::new("**Raw** title")
            .with_block(Block::markdown("`Block`", "## **Bold** and `code` [link](x)\n# **"));
        let plan = OutlinePlan::from_document(&doc);
        let labels: Vec<&str> = plan.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["**Raw** title", "`Block`", "Bold and code [link](x)"]);
    }

    #[test]
    fn at_most_one_level_one_node() {
        let doc = Document::new("Only")
            .with_block(Block::markdown("x", "# a\n# b\n## c"))
            .with_block(Block::markdown("y", "#### d"));
        let plan = OutlinePlan::from_document(&doc);
        assert_eq!(plan.entries().iter().filter(|e| e.level == 1).count(), 1);
        assert!(plan.entries().iter().all(|e| e.level == 1 || e.parent.is_some()));
    }

    #[test]
    fn empty_blocks_and_whitespace_titles_add_nothing() {
        let doc = Document::new("  ").with_block(Block::markdown("  ", "\n"));
        assert!(OutlinePlan::from_document(&doc).is_empty());
    }

    #[test]
    fn corrupted_pdf_is_returned_unchanged() {
        let garbage = b"%PDF-1.4 this is not really a pdf".to_vec();
        let doc = Document::new("Title");
        assert_eq!(synthesize(&garbage, &doc), garbage);
    }

    #[test]
    fn documents_without_headings_keep_their_bytes() {
        let pdf = rendered_pdf(1);
        assert_eq!(synthesize(&pdf, &Document::default()), pdf);
    }

    #[test]
    fn written_outline_reads_back_with_depths_and_first_page_targets() {
        let pdf = rendered_pdf(200);
        let doc = Document::new("Résumé")
            .with_block(Block::markdown("Section", "# Part\n## Detail"))
            .with_block(Block::markdown("Appendix", ""));
        let out = synthesize(&pdf, &doc);
        assert_ne!(out, pdf);

        let report = inspect_pdf_bytes(&out).expect("inspect");
        assert!(report.page_count > 1);
        let outline: Vec<(&str, usize, Option<u32>)> = report
            .outline
            .iter()
            .map(|item| (item.title.as_str(), item.depth, item.page))
            .collect();
        assert_eq!(
            outline,
            vec![
                ("Résumé", 0, Some(1)),
                ("Section", 1, Some(1)),
                ("Part", 2, Some(1)),
                ("Detail", 3, Some(1)),
                ("Appendix", 1, Some(1)),
            ]
        );
    }

    #[test]
    fn very_deep_headings_only_track_used_levels() {
        let content = format!("{} Deep\n# Shallow", "#".repeat(1_000_000));
        let doc = Document::new("T").with_block(Block::markdown("", content));
        let plan = OutlinePlan::from_document(&doc);
        assert_eq!(
            shape(&plan),
            vec![
                ("T", 1, None),
                ("Deep", 1_000_002, Some(0)),
                ("Shallow", 3, Some(0)),
            ]
        );
    }

    #[test]
    fn long_sibling_runs_link_prev_and_next_in_order() {
        let content: String = (0..500).map(|i| format!("# H{i}\n")).collect();
        let doc = Document::new("T").with_block(Block::markdown("", content));
        let plan = OutlinePlan::from_document(&doc);
        let out = write_outline(&rendered_pdf(1), &plan).expect("write");

        let pdf = LoDocument::load_mem(&out).expect("load");
        let title = |id: LoObjectId| -> Vec<u8> {
            let item = pdf.get_object(id).and_then(LoObject::as_dict).expect("item");
            item.get(b"Title").and_then(LoObject::as_str).expect("title").to_vec()
        };
        let link = |id: LoObjectId, key: &str| -> Option<LoObjectId> {
            let item = pdf.get_object(id).and_then(LoObject::as_dict).expect("item");
            item.get(key.as_bytes()).and_then(LoObject::as_reference).ok()
        };

        let report = inspect_pdf_bytes(&out).expect("inspect");
        assert_eq!(report.outline.len(), 501);
        assert_eq!(report.outline[500].title, "H499");

        let catalog_id = pdf.trailer.get(b"Root").and_then(LoObject::as_reference).expect("root");
        let outlines_id = pdf
            .get_object(catalog_id)
            .and_then(LoObject::as_dict)
            .and_then(|c| c.get(b"Outlines"))
            .and_then(LoObject::as_reference)
            .expect("outlines");
        let top = link(outlines_id, "First").expect("top");
        let mut cursor = link(top, "First");
        let mut previous = None;
        let mut seen = 0;
        while let Some(id) = cursor {
            assert_eq!(title(id), format!("H{seen}").into_bytes());
            assert_eq!(link(id, "Prev"), previous);
            previous = Some(id);
            cursor = link(id, "Next");
            seen += 1;
        }
        assert_eq!(seen, 500);
        assert_eq!(link(top, "Last"), previous);
    }

    #[test]
    fn descendant_counts_cover_whole_subtrees() {
        let doc = Document::new("T").with_block(Block::markdown("A", "# x\n## y\n# z"));
        let plan = OutlinePlan::from_document(&doc);
        assert_eq!(plan.descendant_counts(), vec![4, 3, 1, 0, 0]);
    }

    #[test]
    fn non_ascii_labels_are_utf16() {
        let LoObject::String(bytes, StringFormat::Hexadecimal) = pdf_text_string("é") else {
            panic!("expected hex string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9]);
        assert!(matches!(
            pdf_text_string("plain"),
            LoObject::String(_, StringFormat::Literal)
        ));
    }
}
