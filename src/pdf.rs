//! PDF emission – translates positioned boxes into PDF content streams via
//! `lopdf`.
//!
//! Only builtin Type1 fonts are used (Helvetica, Times, Courier), with
//! WinAnsiEncoding so every glyph is a single byte. Object ids are
//! allocated sequentially and nothing time- or environment-dependent is
//! written, so the same document always serialises to the same bytes.

use std::collections::BTreeSet;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as PdfDocument, Object, Stream, StringFormat};

use crate::document::{BoxKind, Document, LayoutBox, TextContent};
use crate::error::{RenderError, Result};
use crate::fonts::FontManager;

/// Serialise a laid-out document to PDF bytes.
pub fn emit(document: &Document, fonts: &FontManager) -> Result<Vec<u8>> {
    let font_map = collect_fonts(document)?;

    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut font_dict = Dictionary::new();
    for (name, base_font) in &font_map {
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font.as_str(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(name.as_bytes(), font_id);
    }
    let resources_id = pdf.add_object(dictionary! {
        "Font" => font_dict,
    });

    let mut page_ids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = page_content(page.boxes.as_slice(), document.page_height_pt, &font_map, fonts)?;
        let encoded = content
            .encode()
            .map_err(|e| RenderError::Emit(format!("content stream: {e}")))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id.into());
    }

    let page_count = page_ids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0f32.into(),
                0f32.into(),
                document.page_width_pt.into(),
                document.page_height_pt.into(),
            ],
        }),
    );

    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::String(to_winansi(&document.title), StringFormat::Literal),
    });
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|e| RenderError::Emit(e.to_string()))?;
    Ok(bytes)
}

/// Collect every (family, bold) pair used in the document and assign
/// deterministic internal names F1..Fn. Fails on a family outside the
/// builtin set.
fn collect_fonts(document: &Document) -> Result<Vec<(String, String)>> {
    let mut used: BTreeSet<(String, bool)> = BTreeSet::new();
    for page in &document.pages {
        for b in &page.boxes {
            if let BoxKind::Text(text) = &b.kind {
                used.insert((text.font_family.clone(), text.bold));
            }
        }
    }
    if used.is_empty() {
        // Keep at least one font so the resources dictionary is never
        // empty and blank documents stay byte-stable.
        used.insert(("Helvetica".to_string(), false));
    }

    let mut map = Vec::with_capacity(used.len());
    for (i, (family, bold)) in used.into_iter().enumerate() {
        let base = base_font(&family, bold)?;
        map.push((format!("F{}", i + 1), base.to_string()));
    }
    Ok(map)
}

/// PostScript name of a builtin Type1 font.
fn base_font(family: &str, bold: bool) -> Result<&'static str> {
    match (family, bold) {
        ("Helvetica", false) => Ok("Helvetica"),
        ("Helvetica", true) => Ok("Helvetica-Bold"),
        ("Times", false) => Ok("Times-Roman"),
        ("Times", true) => Ok("Times-Bold"),
        ("Courier", false) => Ok("Courier"),
        ("Courier", true) => Ok("Courier-Bold"),
        _ => Err(RenderError::Emit(format!(
            "unsupported font family `{family}`"
        ))),
    }
}

fn font_name<'a>(map: &'a [(String, String)], text: &TextContent) -> Result<&'a str> {
    let base = base_font(&text.font_family, text.bold)?;
    map.iter()
        .find(|(_, b)| b == base)
        .map(|(name, _)| name.as_str())
        .ok_or_else(|| RenderError::Emit(format!("font `{base}` not registered")))
}

/// Build one page's content stream. Layout coordinates are top-left based;
/// PDF user space is bottom-left, so every y is flipped here.
fn page_content(
    boxes: &[LayoutBox],
    page_height: f32,
    font_map: &[(String, String)],
    fonts: &FontManager,
) -> Result<Content> {
    let mut ops: Vec<Operation> = Vec::new();
    for b in boxes {
        match &b.kind {
            BoxKind::Text(text) => {
                let name = font_name(font_map, text)?;
                for line in &text.lines {
                    if line.text.is_empty() {
                        continue;
                    }
                    let baseline = b.y
                        + line.y_offset
                        + fonts.ascender(text.font_size, &text.font_family, text.bold);
                    ops.push(Operation::new("BT", vec![]));
                    ops.push(Operation::new(
                        "Tf",
                        vec![name.into(), text.font_size.into()],
                    ));
                    ops.push(Operation::new(
                        "rg",
                        vec![
                            text.color[0].into(),
                            text.color[1].into(),
                            text.color[2].into(),
                        ],
                    ));
                    ops.push(Operation::new(
                        "Td",
                        vec![
                            (b.x + line.x_offset).into(),
                            (page_height - baseline).into(),
                        ],
                    ));
                    ops.push(Operation::new(
                        "Tj",
                        vec![Object::String(
                            to_winansi(&line.text),
                            StringFormat::Literal,
                        )],
                    ));
                    ops.push(Operation::new("ET", vec![]));
                }
            }
            BoxKind::FillRect { color } => {
                ops.push(Operation::new(
                    "rg",
                    vec![color[0].into(), color[1].into(), color[2].into()],
                ));
                ops.push(Operation::new(
                    "re",
                    vec![
                        b.x.into(),
                        (page_height - b.y - b.height).into(),
                        b.width.into(),
                        b.height.into(),
                    ],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            BoxKind::StrokeRect { color, line_width } => {
                ops.push(Operation::new(
                    "RG",
                    vec![color[0].into(), color[1].into(), color[2].into()],
                ));
                ops.push(Operation::new("w", vec![(*line_width).into()]));
                ops.push(Operation::new(
                    "re",
                    vec![
                        b.x.into(),
                        (page_height - b.y - b.height).into(),
                        b.width.into(),
                        b.height.into(),
                    ],
                ));
                ops.push(Operation::new("S", vec![]));
            }
            BoxKind::Rule { color, thickness } => {
                let y = page_height - b.y - thickness / 2.0;
                ops.push(Operation::new(
                    "RG",
                    vec![color[0].into(), color[1].into(), color[2].into()],
                ));
                ops.push(Operation::new("w", vec![(*thickness).into()]));
                ops.push(Operation::new("m", vec![b.x.into(), y.into()]));
                ops.push(Operation::new("l", vec![(b.x + b.width).into(), y.into()]));
                ops.push(Operation::new("S", vec![]));
            }
        }
    }
    Ok(Content { operations: ops })
}

/// Encode text as Windows-1252 bytes for WinAnsiEncoding builtin fonts.
/// Characters outside the code page map to the usual 0x80–0x9F slots where
/// one exists, otherwise to `?`.
fn to_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}
