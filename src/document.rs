//! Paginated document model – the intermediate representation between layout
//! computation and PDF emission. This is the "frozen" structure that encodes
//! exactly what goes on each page.

use serde::{Deserialize, Serialize};

/// A complete laid-out document ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "Document::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages. Never empty: an empty input still lays out
    /// to a single blank page.
    pub pages: Vec<Page>,
}

/// One page of content. Boxes are painted in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned primitive, relative to the page top-left, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(flatten)]
    pub kind: BoxKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoxKind {
    /// Wrapped, aligned text.
    Text(TextContent),
    /// Solid fill (table header backgrounds).
    FillRect { color: [f32; 3] },
    /// Rectangle outline (table cell grid).
    StrokeRect { color: [f32; 3], line_width: f32 },
    /// Horizontal rule.
    Rule { color: [f32; 3], thickness: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines with alignment offsets already applied.
    pub lines: Vec<TextLine>,
    pub font_family: String,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (alignment).
    pub x_offset: f32,
    /// Y offset of the line top from the top of the box.
    pub y_offset: f32,
}

impl Document {
    pub fn new(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "faktura output".to_string()
    }

    /// Serialise to JSON (layout snapshots, `--layout-json`).
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// All text runs on a page, in paint order. Test helper used widely
    /// enough to live here.
    pub fn text_runs(&self, page_index: usize) -> Vec<&TextContent> {
        self.pages
            .get(page_index)
            .map(|page| {
                page.boxes
                    .iter()
                    .filter_map(|b| match &b.kind {
                        BoxKind::Text(t) => Some(t),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, kind: BoxKind) -> Self {
        Self {
            x,
            y,
            width,
            height,
            kind,
        }
    }
}
