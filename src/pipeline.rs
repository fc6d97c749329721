//! Pipeline – ties together parsing, totals, binding, layout and PDF
//! emission into a single function call.
//!
//! Every stage is a pure function of its inputs, so renders are independent
//! across threads and the same (template, record, config) triple always
//! produces byte-identical output. The first stage to fail short-circuits
//! the rest; nothing is emitted on error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binding::{resolve, BindMode};
use crate::document::Document;
use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout::layout;
use crate::markup::{parse, ParseMode};
use crate::pdf::emit;
use crate::record::Currency;
use crate::totals::ensure_totals;

/// Default page margin in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Configuration for the rendering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    /// Font size for nodes without an explicit `font-size`, in points.
    pub font_size: f32,
    /// Builtin font family (Helvetica, Times, Courier).
    pub font_family: String,
    pub parse_mode: ParseMode,
    pub bind_mode: BindMode,
    pub currency: Currency,
    /// Re-emit a table's header row after an in-table page break.
    pub repeat_table_header: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: "faktura output".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            margin_top: PAGE_MARGIN_PT,
            margin_right: PAGE_MARGIN_PT,
            margin_bottom: PAGE_MARGIN_PT,
            margin_left: PAGE_MARGIN_PT,
            font_size: 10.0,
            font_family: "Helvetica".to_string(),
            parse_mode: ParseMode::Strict,
            bind_mode: BindMode::Lenient,
            currency: Currency::default(),
            repeat_table_header: true,
        }
    }
}

/// Full pipeline: markup template + data record → PDF bytes.
pub fn render(markup: &str, record: &Value, config: &PageConfig) -> Result<Vec<u8>> {
    let fonts = FontManager::default();
    render_with_fonts(markup, record, config, &fonts)
}

/// As [`render`], with caller-loaded fonts for exact text metrics.
pub fn render_with_fonts(
    markup: &str,
    record: &Value,
    config: &PageConfig,
    fonts: &FontManager,
) -> Result<Vec<u8>> {
    let document = render_document_with_fonts(markup, record, config, fonts)?;
    emit(&document, fonts)
}

/// Run the pipeline up to the paginated document, without emitting PDF
/// bytes. Used by tests and the CLI's layout snapshot flag.
pub fn render_document(markup: &str, record: &Value, config: &PageConfig) -> Result<Document> {
    let fonts = FontManager::default();
    render_document_with_fonts(markup, record, config, &fonts)
}

pub fn render_document_with_fonts(
    markup: &str,
    record: &Value,
    config: &PageConfig,
    fonts: &FontManager,
) -> Result<Document> {
    // 1. Parse the template.
    let tree = parse(markup, config.parse_mode)?;
    log::debug!("parsed template: {} top-level nodes", tree.children.len());

    // 2. Supplement the record with computed totals.
    let mut record = record.clone();
    ensure_totals(&mut record);

    // 3. Resolve bindings.
    let bound = resolve(&tree, &record, config.bind_mode, &config.currency)?;

    // 4. Lay out and paginate.
    let document = layout(&bound, config, fonts)?;
    log::debug!("laid out {} page(s)", document.pages.len());
    Ok(document)
}
