//! Built-in renderer that lays out the text of the composed HTML with the standard 14
//! fonts. It needs no external binary, so it backs the error page and offline use.
//!
//! Styling is reduced to three faces: Helvetica for body text, Helvetica-Bold for
//! headings and Courier for preformatted blocks.

use crate::error::Result;
use crate::outline::pdf_text_string;
use crate::renderer::PdfRenderer;
use crate::types::PageSetup;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;
use lopdf::content::{Content, Operation};
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, StringFormat, dictionary};

const PRODUCER: &str = concat!("docpress ", env!("CARGO_PKG_VERSION"));
const LINE_HEIGHT: f32 = 1.35;
const BULLET: &str = "\u{2022} ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Heading(u8),
    Body,
    Mono,
}

impl TextStyle {
    fn font(self) -> Face {
        match self {
            TextStyle::Heading(_) => Face::Bold,
            TextStyle::Body => Face::Regular,
            TextStyle::Mono => Face::Mono,
        }
    }

    fn size(self) -> f32 {
        match self {
            TextStyle::Heading(1) => 20.0,
            TextStyle::Heading(2) => 16.0,
            TextStyle::Heading(3) => 14.0,
            TextStyle::Heading(_) => 12.0,
            TextStyle::Body => 11.0,
            TextStyle::Mono => 9.5,
        }
    }

    fn space_before(self) -> f32 {
        match self {
            TextStyle::Heading(_) => 10.0,
            TextStyle::Body => 4.0,
            TextStyle::Mono => 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Mono,
}

impl Face {
    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Mono => "F3",
        }
    }

    // Average advance as a fraction of the font size.
    fn em_ratio(self) -> f32 {
        match self {
            Face::Regular => 0.5,
            Face::Bold => 0.55,
            Face::Mono => 0.6,
        }
    }
}

/// One paragraph-level run of text extracted from HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub style: TextStyle,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextPdfRenderer;

impl TextPdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl PdfRenderer for TextPdfRenderer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn render(&self, html: &str, page: &PageSetup) -> Result<Vec<u8>> {
        let document = kuchiki::parse_html().one(html);
        let title = document_title(&document);
        let mut blocks = Vec::new();
        collect_blocks(&document, &mut blocks);
        let pages = paginate(&layout_lines(&blocks, page), page);
        tracing::debug!(blocks = blocks.len(), pages = pages.len(), "text layout done");
        write_pdf(&pages, page, title.as_deref())
    }
}

/// Flatten an HTML document into paragraph-level blocks in reading order.
pub fn html_to_blocks(html: &str) -> Vec<TextBlock> {
    let document = kuchiki::parse_html().one(html);
    let mut blocks = Vec::new();
    collect_blocks(&document, &mut blocks);
    blocks
}

fn document_title(document: &NodeRef) -> Option<String> {
    document
        .descendants()
        .find(|node| {
            node.as_element()
                .is_some_and(|el| &*el.name.local == "title")
        })
        .map(|node| collapse_whitespace(&node.text_contents()))
        .filter(|title| !title.is_empty())
}

fn collect_blocks(node: &NodeRef, out: &mut Vec<TextBlock>) {
    for child in node.children() {
        let Some(element) = child.as_element() else {
            if let Some(text) = child.as_text() {
                push_block(out, TextStyle::Body, collapse_whitespace(&text.borrow()));
            }
            continue;
        };
        match &*element.name.local {
            "head" | "script" | "style" | "title" | "template" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = element.name.local.as_bytes()[1] - b'0';
                push_block(
                    out,
                    TextStyle::Heading(level),
                    collapse_whitespace(&child.text_contents()),
                );
            }
            "p" | "dt" | "dd" | "caption" | "figcaption" => {
                push_block(out, TextStyle::Body, collapse_whitespace(&child.text_contents()));
            }
            "li" => {
                let mut own_text = String::new();
                let mut nested = Vec::new();
                for item_child in child.children() {
                    let is_list = item_child
                        .as_element()
                        .is_some_and(|el| matches!(&*el.name.local, "ul" | "ol"));
                    if is_list {
                        nested.push(item_child);
                    } else {
                        own_text.push_str(&item_child.text_contents());
                        own_text.push(' ');
                    }
                }
                let own_text = collapse_whitespace(&own_text);
                if !own_text.is_empty() {
                    push_block(out, TextStyle::Body, format!("{BULLET}{own_text}"));
                }
                for list in nested {
                    collect_blocks(&list, out);
                }
            }
            "tr" => {
                let cells: Vec<String> = child
                    .children()
                    .filter(|cell| {
                        cell.as_element()
                            .is_some_and(|el| matches!(&*el.name.local, "td" | "th"))
                    })
                    .map(|cell| collapse_whitespace(&cell.text_contents()))
                    .collect();
                push_block(out, TextStyle::Body, cells.join(" | "));
            }
            "pre" => {
                let text = child.text_contents();
                let text = text.trim_end_matches(['\n', '\r']);
                if !text.trim().is_empty() {
                    out.push(TextBlock {
                        style: TextStyle::Mono,
                        text: text.replace('\t', "    "),
                    });
                }
            }
            _ => collect_blocks(&child, out),
        }
    }
}

fn push_block(out: &mut Vec<TextBlock>, style: TextStyle, text: String) {
    if !text.is_empty() {
        out.push(TextBlock { style, text });
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq)]
struct Line {
    face: Face,
    size: f32,
    space_before: f32,
    text: String,
}

fn layout_lines(blocks: &[TextBlock], page: &PageSetup) -> Vec<Line> {
    let mut lines = Vec::new();
    for block in blocks {
        let face = block.style.font();
        let size = block.style.size();
        let columns = ((page.printable_width() / (size * face.em_ratio())).floor() as usize).max(8);
        let wrapped: Vec<String> = match block.style {
            TextStyle::Mono => block
                .text
                .lines()
                .flat_map(|raw| {
                    if raw.chars().count() <= columns {
                        vec![raw.to_string()]
                    } else {
                        textwrap::wrap(raw, columns)
                            .into_iter()
                            .map(|part| part.into_owned())
                            .collect()
                    }
                })
                .collect(),
            _ => textwrap::wrap(&block.text, columns)
                .into_iter()
                .map(|part| part.into_owned())
                .collect(),
        };
        for (idx, text) in wrapped.into_iter().enumerate() {
            lines.push(Line {
                face,
                size,
                space_before: if idx == 0 { block.style.space_before() } else { 0.0 },
                text,
            });
        }
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    line: Line,
    x: f32,
    y: f32,
}

fn paginate(lines: &[Line], page: &PageSetup) -> Vec<Vec<PlacedLine>> {
    let top = page.size.height - page.margins.top;
    let bottom = page.margins.bottom;
    let mut pages = vec![Vec::new()];
    let mut cursor = top;
    for line in lines {
        let leading = line.size * LINE_HEIGHT;
        let at_top = cursor >= top;
        let mut y = cursor - leading - if at_top { 0.0 } else { line.space_before };
        if y < bottom && !at_top {
            pages.push(Vec::new());
            y = top - leading;
        }
        cursor = y;
        if let Some(current) = pages.last_mut() {
            current.push(PlacedLine {
                line: line.clone(),
                x: page.margins.left,
                // Baseline sits a little above the bottom of the line box.
                y: y + (leading - line.size),
            });
        }
    }
    pages
}

fn write_pdf(pages: &[Vec<PlacedLine>], page: &PageSetup, title: Option<&str>) -> Result<Vec<u8>> {
    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = |base: &str| {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => LoObject::Name(base.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        }
    };
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let mono_id = doc.add_object(font("Courier"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
            "F3" => mono_id,
        },
    });

    let media_box = vec![
        LoObject::Integer(0),
        LoObject::Integer(0),
        LoObject::Real(page.size.width),
        LoObject::Real(page.size.height),
    ];
    let mut kids = Vec::with_capacity(pages.len());
    for placed in pages {
        let content = Content {
            operations: page_operations(placed),
        };
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box.clone(),
        });
        kids.push(LoObject::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => LoObject::string_literal(PRODUCER),
    };
    if let Some(title) = title {
        info.set("Title", pdf_text_string(title));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn page_operations(lines: &[PlacedLine]) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(lines.len() * 4);
    for placed in lines {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![placed.line.face.resource().into(), placed.line.size.into()],
        ));
        ops.push(Operation::new("Td", vec![placed.x.into(), placed.y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![LoObject::String(
                winansi_bytes(&placed.line.text),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// Encode text for a WinAnsi simple font. Characters outside the encoding become `?`.
pub fn winansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            ' '..='~' => ch as u8,
            '\u{a0}'..='\u{ff}' => ch as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => b'?',
        })
        .collect()
}
