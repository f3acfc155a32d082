use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEncryptedUnsupported,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// One bookmark, flattened in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub title: String,
    /// 0 for top-level bookmarks.
    pub depth: usize,
    /// 1-based page number of an explicit destination, if it resolves to a page.
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub outline: Vec<OutlineItem>,
}

impl PdfInspectReport {
    /// Indented outline, two spaces per depth, with the target page when known.
    pub fn outline_tree(&self) -> String {
        let mut out = String::new();
        for item in &self.outline {
            out.push_str(&"  ".repeat(item.depth));
            out.push_str(&item.title);
            if let Some(page) = item.page {
                out.push_str(&format!(" (p. {page})"));
            }
            out.push('\n');
        }
        out
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;
    let encrypted = pdf.is_encrypted();
    let pages = pdf.get_pages();
    let page_numbers: BTreeMap<LoObjectId, u32> =
        pages.iter().map(|(number, id)| (*id, *number)).collect();

    // Bookmark titles of an encrypted file are ciphertext.
    let outline = if encrypted {
        Vec::new()
    } else {
        read_outline(&pdf, &page_numbers)
    };

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        encrypted,
        file_size_bytes: bytes.len(),
        outline,
    })
}

/// Fails for files whose outline [`inspect_pdf_bytes`] could not read.
pub fn require_readable_outline(report: &PdfInspectReport) -> Result<(), PdfInspectError> {
    if report.encrypted {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEncryptedUnsupported,
            message: "encrypted pdf outlines are not supported".to_string(),
        });
    }
    Ok(())
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

fn read_outline(pdf: &LoDocument, page_numbers: &BTreeMap<LoObjectId, u32>) -> Vec<OutlineItem> {
    let mut items = Vec::new();
    let Some(root) = pdf
        .trailer
        .get(b"Root")
        .and_then(LoObject::as_reference)
        .and_then(|id| pdf.get_object(id))
        .and_then(LoObject::as_dict)
        .ok()
        .and_then(|catalog| catalog.get(b"Outlines").ok())
        .and_then(|outlines| resolve_dict(pdf, outlines))
    else {
        return items;
    };
    let mut seen = HashSet::new();
    if let Some(first) = root.get(b"First").ok().and_then(|o| o.as_reference().ok()) {
        walk_siblings(pdf, first, 0, page_numbers, &mut seen, &mut items);
    }
    items
}

// `seen` guards against cyclic /Next or /First links in malformed files.
fn walk_siblings(
    pdf: &LoDocument,
    first: LoObjectId,
    depth: usize,
    page_numbers: &BTreeMap<LoObjectId, u32>,
    seen: &mut HashSet<LoObjectId>,
    items: &mut Vec<OutlineItem>,
) {
    let mut cursor = Some(first);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            return;
        }
        let Ok(item) = pdf.get_object(id).and_then(LoObject::as_dict) else {
            return;
        };
        let title = item
            .get(b"Title")
            .ok()
            .and_then(|t| t.as_str().ok())
            .map(decode_text_string)
            .unwrap_or_default();
        let page = item
            .get(b"Dest")
            .ok()
            .and_then(|dest| dest.as_array().ok())
            .and_then(|dest| dest.first())
            .and_then(|target| target.as_reference().ok())
            .and_then(|target| page_numbers.get(&target).copied());
        items.push(OutlineItem { title, depth, page });

        if let Some(child) = item.get(b"First").ok().and_then(|o| o.as_reference().ok()) {
            walk_siblings(pdf, child, depth + 1, page_numbers, seen, items);
        }
        cursor = item.get(b"Next").ok().and_then(|o| o.as_reference().ok());
    }
}

fn resolve_dict<'a>(pdf: &'a LoDocument, object: &'a LoObject) -> Option<&'a lopdf::Dictionary> {
    match object {
        LoObject::Reference(id) => pdf.get_object(*id).and_then(LoObject::as_dict).ok(),
        LoObject::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a byte order mark, otherwise the
/// single-byte encoding, read as Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|b| char::from(*b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream as LoStream, dictionary};

    fn make_single_page_pdf_bytes(text: &str, with_outline: bool) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", text).into_bytes();
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, LoObject::Dictionary(pages));
        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if with_outline {
            let outlines_id = doc.new_object_id();
            let parent_id = doc.new_object_id();
            let child_id = doc.add_object(dictionary! {
                "Title" => LoObject::string_literal("Child"),
                "Parent" => parent_id,
                "Dest" => vec![LoObject::Reference(page_id), LoObject::Name(b"Fit".to_vec())],
            });
            doc.objects.insert(
                parent_id,
                LoObject::Dictionary(dictionary! {
                    "Title" => LoObject::string_literal("Parent"),
                    "Parent" => outlines_id,
                    "First" => child_id,
                    "Last" => child_id,
                    "Count" => 1,
                }),
            );
            doc.objects.insert(
                outlines_id,
                LoObject::Dictionary(dictionary! {
                    "Type" => "Outlines",
                    "First" => parent_id,
                    "Last" => parent_id,
                    "Count" => 2,
                }),
            );
            catalog.set("Outlines", outlines_id);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn inspect_pdf_bytes_reads_version_and_page_count() {
        let bytes = make_single_page_pdf_bytes("HELLO", false);
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(report.page_count, 1);
        assert!(!report.encrypted);
        assert_eq!(report.file_size_bytes, bytes.len());
        assert!(!report.pdf_version.is_empty());
        assert!(report.outline.is_empty());
    }

    #[test]
    fn inspect_pdf_bytes_flattens_the_outline() {
        let bytes = make_single_page_pdf_bytes("HELLO", true);
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(
            report.outline,
            vec![
                OutlineItem {
                    title: "Parent".to_string(),
                    depth: 0,
                    page: None,
                },
                OutlineItem {
                    title: "Child".to_string(),
                    depth: 1,
                    page: Some(1),
                },
            ]
        );
        assert_eq!(report.outline_tree(), "Parent\n  Child (p. 1)\n");
    }

    fn mark_encrypted(bytes: &[u8]) -> Vec<u8> {
        let mut doc = LoDocument::load_mem(bytes).expect("load");
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "P" => -4,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn inspect_pdf_bytes_reports_encrypted_files() {
        let bytes = mark_encrypted(&make_single_page_pdf_bytes("LOCKED", true));
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert!(report.encrypted);
        assert_eq!(report.page_count, 1);
        assert!(report.outline.is_empty());
        let err = require_readable_outline(&report).expect_err("encrypted");
        assert_eq!(err.code, PdfInspectErrorCode::PdfEncryptedUnsupported);

        let plain = inspect_pdf_bytes(&make_single_page_pdf_bytes("OPEN", true)).expect("inspect");
        assert!(require_readable_outline(&plain).is_ok());
    }

    #[test]
    fn inspect_pdf_bytes_rejects_malformed_data() {
        let err = inspect_pdf_bytes(b"not a pdf").expect_err("invalid");
        assert_eq!(err.code, PdfInspectErrorCode::PdfParseFailed);
        assert!(err.to_string().starts_with("PDF_PARSE_FAILED: "));
    }

    #[test]
    fn inspect_pdf_path_reports_io_error_for_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = inspect_pdf_path(&dir.path().join("missing.pdf")).expect_err("missing");
        assert_eq!(err.code, PdfInspectErrorCode::PdfIoError);
    }

    #[test]
    fn inspect_pdf_path_matches_bytes_report() {
        let bytes = make_single_page_pdf_bytes("PATH", true);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("one.pdf");
        std::fs::write(&path, &bytes).expect("write");

        let from_path = inspect_pdf_path(&path).expect("inspect path");
        let from_bytes = inspect_pdf_bytes(&bytes).expect("inspect bytes");
        assert_eq!(from_path, from_bytes);
    }

    #[test]
    fn text_strings_decode_utf16_and_latin1() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0xE9, 0x00, 0x41]), "éA");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }
}
