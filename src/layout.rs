//! Layout engine – converts a resolved node tree into positioned boxes on
//! pages. Block flow only: sections, text and rules stack downward from the
//! top margin; tables place rows with fixed column widths.
//!
//! Pagination happens inline. The cursor (page index + y position) is
//! threaded through every call and returned, never stored; a block that
//! would strictly overflow the bottom margin opens a new page, while an
//! exact fit stays. Table rows never split across pages.

use crate::document::{BoxKind, Document, LayoutBox, Page, TextContent, TextLine};
use crate::error::{RenderError, Result};
use crate::fonts::{wrap_text, FontManager};
use crate::markup::{Node, NodeKind};
use crate::pipeline::PageConfig;
use crate::style::{Align, Width};

/// Padding inside a table cell, on all four sides.
pub const CELL_PADDING: f32 = 4.0;
/// Default thickness of a `<line/>` rule.
pub const RULE_THICKNESS: f32 = 0.75;
/// Stroke width of the table cell grid.
const GRID_LINE_WIDTH: f32 = 0.5;
/// Fill behind header rows.
const HEADER_FILL: [f32; 3] = [0.92, 0.92, 0.92];
/// Tolerance for the exact-fit comparison; only a strict overflow breaks.
const FIT_EPSILON: f32 = 0.001;

/// Where the next block goes.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    page: usize,
    y: f32,
}

/// Lay out a resolved tree onto pages. The tree must not contain bindings;
/// resolve it first. Page 0 always exists, even for an empty document.
pub fn layout(root: &Node, config: &PageConfig, fonts: &FontManager) -> Result<Document> {
    let mut engine = LayoutEngine {
        config,
        fonts,
        pages: Vec::new(),
    };
    engine.ensure_page(0);
    let start = Cursor {
        page: 0,
        y: config.margin_top,
    };
    engine.layout_children(&root.children, start)?;

    let mut doc = Document::new(config.title.clone(), config.page_width, config.page_height);
    doc.pages = engine.pages;
    Ok(doc)
}

struct LayoutEngine<'a> {
    config: &'a PageConfig,
    fonts: &'a FontManager,
    pages: Vec<Page>,
}

impl<'a> LayoutEngine<'a> {
    fn content_width(&self) -> f32 {
        self.config.page_width - self.config.margin_left - self.config.margin_right
    }

    /// Y coordinate of the bottom of the content area.
    fn content_bottom(&self) -> f32 {
        self.config.page_height - self.config.margin_bottom
    }

    fn content_height(&self) -> f32 {
        self.content_bottom() - self.config.margin_top
    }

    fn ensure_page(&mut self, index: usize) {
        while self.pages.len() <= index {
            self.pages.push(Page {
                page_index: self.pages.len(),
                boxes: Vec::new(),
            });
        }
    }

    fn push_box(&mut self, page: usize, layout_box: LayoutBox) {
        self.ensure_page(page);
        self.pages[page].boxes.push(layout_box);
    }

    /// Advance to the next page's top margin.
    fn next_page(&mut self, cursor: Cursor) -> Cursor {
        let cursor = Cursor {
            page: cursor.page + 1,
            y: self.config.margin_top,
        };
        self.ensure_page(cursor.page);
        cursor
    }

    /// True when a block of `height` placed at the cursor strictly
    /// overflows the page. Exact fit stays.
    fn overflows(&self, cursor: Cursor, height: f32) -> bool {
        cursor.y + height > self.content_bottom() + FIT_EPSILON
    }

    fn layout_children(&mut self, children: &[Node], mut cursor: Cursor) -> Result<Cursor> {
        for child in children {
            cursor = self.layout_node(child, cursor)?;
        }
        Ok(cursor)
    }

    fn layout_node(&mut self, node: &Node, cursor: Cursor) -> Result<Cursor> {
        if let Some(height) = node.style.height {
            if matches!(node.kind, NodeKind::Section | NodeKind::Text) {
                let mut cursor = self.layout_fixed(node, cursor, height)?;
                cursor.y += node.style.spacing;
                return Ok(cursor);
            }
        }
        let mut cursor = match node.kind {
            NodeKind::Section => self.layout_children(&node.children, cursor)?,
            NodeKind::Text => self.layout_text(node, cursor)?,
            NodeKind::Rule => self.layout_rule(node, cursor)?,
            NodeKind::Table => self.layout_table(node, cursor)?,
            // The parser confines rows and cells to tables, and documents
            // to the root; layout_table consumes rows and cells directly.
            NodeKind::Row | NodeKind::Cell | NodeKind::Document => {
                self.layout_children(&node.children, cursor)?
            }
        };
        cursor.y += node.style.spacing;
        Ok(cursor)
    }

    /// A block with an explicit `height` occupies exactly that much vertical
    /// space, whatever its content measures. An empty section with a height
    /// acts as a spacer. The cursor lands `height` below the block's top on
    /// the page where it starts, even if oversized content spilled further.
    fn layout_fixed(&mut self, node: &Node, cursor: Cursor, height: f32) -> Result<Cursor> {
        if height > self.content_height() + FIT_EPSILON {
            return Err(RenderError::Layout(format!(
                "explicit height {height:.1}pt exceeds page content height"
            )));
        }
        let mut cursor = cursor;
        if self.overflows(cursor, height) {
            cursor = self.next_page(cursor);
        }
        let top = cursor.y;
        match node.kind {
            NodeKind::Text => {
                self.layout_text(node, cursor)?;
            }
            _ => {
                self.layout_children(&node.children, cursor)?;
            }
        }
        cursor.y = top + height;
        Ok(cursor)
    }

    // -- text -------------------------------------------------------------

    fn layout_text(&mut self, node: &Node, cursor: Cursor) -> Result<Cursor> {
        let font_size = node.style.font_size.unwrap_or(self.config.font_size);
        let family = &self.config.font_family;
        let bold = node.style.bold;
        let avail = resolve_width(&node.style.width, self.content_width());
        let lines = wrap_text(&node.content, font_size, family, bold, avail, self.fonts);
        let line_height = self.fonts.line_height(font_size);
        if line_height > self.content_height() + FIT_EPSILON {
            return Err(RenderError::Layout(format!(
                "line height {line_height:.1}pt exceeds page content height"
            )));
        }

        // Place as many whole lines as fit, then continue on the next page.
        let mut cursor = cursor;
        let mut remaining = lines.as_slice();
        while !remaining.is_empty() {
            let space = self.content_bottom() - cursor.y;
            let fit = ((space + FIT_EPSILON) / line_height).floor() as usize;
            if fit == 0 {
                cursor = self.next_page(cursor);
                continue;
            }
            let take = fit.min(remaining.len());
            let (chunk, rest) = remaining.split_at(take);
            let height = take as f32 * line_height;
            let text = self.text_content(chunk, font_size, family, bold, avail, node.style.align, node.style.color);
            self.push_box(
                cursor.page,
                LayoutBox::new(self.config.margin_left, cursor.y, avail, height, BoxKind::Text(text)),
            );
            cursor.y += height;
            remaining = rest;
        }
        Ok(cursor)
    }

    /// Build a text content box from pre-wrapped lines, computing per-line
    /// alignment offsets here so the emitter stays a dumb translator.
    fn text_content(
        &self,
        lines: &[String],
        font_size: f32,
        family: &str,
        bold: bool,
        avail: f32,
        align: Align,
        color: [f32; 3],
    ) -> TextContent {
        let line_height = self.fonts.line_height(font_size);
        let positioned = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let width = self.fonts.text_width(line, font_size, family, bold);
                let x_offset = match align {
                    Align::Left => 0.0,
                    Align::Center => ((avail - width) / 2.0).max(0.0),
                    Align::Right => (avail - width).max(0.0),
                };
                TextLine {
                    text: line.clone(),
                    x_offset,
                    y_offset: i as f32 * line_height,
                }
            })
            .collect();
        TextContent {
            lines: positioned,
            font_family: family.to_string(),
            font_size,
            bold,
            color,
        }
    }

    // -- rule -------------------------------------------------------------

    fn layout_rule(&mut self, node: &Node, cursor: Cursor) -> Result<Cursor> {
        let thickness = node.style.height.unwrap_or(RULE_THICKNESS);
        let mut cursor = cursor;
        if self.overflows(cursor, thickness) {
            cursor = self.next_page(cursor);
        }
        self.push_box(
            cursor.page,
            LayoutBox::new(
                self.config.margin_left,
                cursor.y,
                self.content_width(),
                thickness,
                BoxKind::Rule {
                    color: node.style.color,
                    thickness,
                },
            ),
        );
        cursor.y += thickness;
        Ok(cursor)
    }

    // -- tables -----------------------------------------------------------

    fn layout_table(&mut self, table: &Node, cursor: Cursor) -> Result<Cursor> {
        let rows = &table.children;
        let Some(first) = rows.first() else {
            return Ok(cursor);
        };
        let widths = column_widths(first, self.content_width());
        let header = rows.iter().find(|row| row.header);

        let mut cursor = cursor;
        for row in rows {
            let measured = self.measure_row(row, &widths)?;
            if measured.height > self.content_height() + FIT_EPSILON {
                return Err(RenderError::Layout(format!(
                    "table row of height {:.1}pt exceeds page content height",
                    measured.height
                )));
            }
            // Rows never split: a row that would strictly overflow defers
            // whole to the next page, after a re-emitted header.
            if self.overflows(cursor, measured.height) {
                cursor = self.next_page(cursor);
                if let Some(header) = header {
                    if self.config.repeat_table_header && !std::ptr::eq(header, row) {
                        let measured_header = self.measure_row(header, &widths)?;
                        cursor = self.emit_row(header, &measured_header, &widths, cursor);
                    }
                }
            }
            cursor = self.emit_row(row, &measured, &widths, cursor);
        }
        Ok(cursor)
    }

    /// Wrap every cell's text and derive the row height (tallest cell plus
    /// padding).
    fn measure_row(&self, row: &Node, widths: &[f32]) -> Result<MeasuredRow> {
        let mut cells = Vec::with_capacity(row.children.len());
        let mut height = 0.0f32;
        let mut column = 0usize;
        for cell in &row.children {
            // Column count is fixed by the first row; a row carrying more
            // cells would draw past the table's right edge.
            if column >= widths.len() {
                return Err(RenderError::Layout(format!(
                    "table row has more cells than its {} fixed columns",
                    widths.len()
                )));
            }
            let span = (cell.style.colspan.max(1) as usize).min(widths.len() - column);
            let cell_width: f32 = widths[column..column + span].iter().sum();
            let text_width = (cell_width - 2.0 * CELL_PADDING).max(1.0);
            let font_size = cell.style.font_size.unwrap_or(self.config.font_size);
            let bold = cell.style.bold || row.header;
            let lines = wrap_text(
                &cell_text(cell),
                font_size,
                &self.config.font_family,
                bold,
                text_width,
                self.fonts,
            );
            let cell_height = lines.len() as f32 * self.fonts.line_height(font_size) + 2.0 * CELL_PADDING;
            height = height.max(cell_height);
            cells.push(MeasuredCell {
                lines,
                width: cell_width,
                font_size,
                bold,
            });
            column += span;
        }
        Ok(MeasuredRow { cells, height })
    }

    fn emit_row(&mut self, row: &Node, measured: &MeasuredRow, widths: &[f32], cursor: Cursor) -> Cursor {
        let mut x = self.config.margin_left;
        let row_width: f32 = widths.iter().sum();
        if row.header {
            self.push_box(
                cursor.page,
                LayoutBox::new(x, cursor.y, row_width, measured.height, BoxKind::FillRect {
                    color: HEADER_FILL,
                }),
            );
        }
        for (cell, node) in measured.cells.iter().zip(&row.children) {
            self.push_box(
                cursor.page,
                LayoutBox::new(x, cursor.y, cell.width, measured.height, BoxKind::StrokeRect {
                    color: [0.0, 0.0, 0.0],
                    line_width: GRID_LINE_WIDTH,
                }),
            );
            let text_width = (cell.width - 2.0 * CELL_PADDING).max(1.0);
            let text = self.text_content(
                &cell.lines,
                cell.font_size,
                &self.config.font_family,
                cell.bold,
                text_width,
                node.style.align,
                node.style.color,
            );
            let text_height = cell.lines.len() as f32 * self.fonts.line_height(cell.font_size);
            self.push_box(
                cursor.page,
                LayoutBox::new(
                    x + CELL_PADDING,
                    cursor.y + CELL_PADDING,
                    text_width,
                    text_height,
                    BoxKind::Text(text),
                ),
            );
            x += cell.width;
        }
        Cursor {
            page: cursor.page,
            y: cursor.y + measured.height,
        }
    }
}

struct MeasuredRow {
    cells: Vec<MeasuredCell>,
    height: f32,
}

struct MeasuredCell {
    lines: Vec<String>,
    width: f32,
    font_size: f32,
    bold: bool,
}

/// Fix column widths once per table from the first row: explicit `width`
/// attributes (pt or % of the content width) are honoured, the remaining
/// width is shared equally among the rest. `colspan` cells count as that
/// many columns.
fn column_widths(first_row: &Node, content_width: f32) -> Vec<f32> {
    let mut widths: Vec<Option<f32>> = Vec::new();
    for cell in &first_row.children {
        let span = cell.style.colspan.max(1) as usize;
        let fixed = match cell.style.width {
            Width::Pt(pt) => Some(pt.min(content_width)),
            Width::Percent(pct) => Some(content_width * pct / 100.0),
            Width::Auto => None,
        };
        // A spanning cell's width is divided evenly over its columns.
        for _ in 0..span {
            widths.push(fixed.map(|w| w / span as f32));
        }
    }
    if widths.is_empty() {
        return vec![content_width];
    }

    let used: f32 = widths.iter().flatten().sum();
    let auto_count = widths.iter().filter(|w| w.is_none()).count();
    let share = if auto_count > 0 {
        ((content_width - used) / auto_count as f32).max(0.0)
    } else {
        0.0
    };
    widths.into_iter().map(|w| w.unwrap_or(share)).collect()
}

fn resolve_width(width: &Width, avail: f32) -> f32 {
    match width {
        Width::Auto => avail,
        Width::Pt(pt) => pt.min(avail),
        Width::Percent(pct) => avail * pct / 100.0,
    }
}

/// Flatten a cell's resolved content: its own text plus any descendant
/// text nodes, in order.
fn cell_text(cell: &Node) -> String {
    fn collect(node: &Node, out: &mut String) {
        if !node.content.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&node.content);
        }
        for child in &node.children {
            collect(child, out);
        }
    }
    let mut out = String::new();
    collect(cell, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, ParseMode};

    fn config() -> PageConfig {
        PageConfig::default()
    }

    fn layout_markup(markup: &str, config: &PageConfig) -> Document {
        let tree = parse(markup, ParseMode::Strict).unwrap();
        layout(&tree, config, &FontManager::default()).unwrap()
    }

    #[test]
    fn empty_document_still_has_page_zero() {
        let doc = layout_markup("<document/>", &config());
        assert_eq!(doc.pages.len(), 1);
        assert!(doc.pages[0].boxes.is_empty());
    }

    #[test]
    fn text_stacks_from_top_margin() {
        let cfg = config();
        let doc = layout_markup(
            "<document><text>one</text><text>two</text></document>",
            &cfg,
        );
        let boxes = &doc.pages[0].boxes;
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].y, cfg.margin_top);
        assert_eq!(boxes[1].y, cfg.margin_top + 12.0); // 10pt font, 1.2 line height
    }

    #[test]
    fn section_spacing_advances_cursor() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><section spacing="8"><text>a</text></section><text>b</text></document>"#,
            &cfg,
        );
        let boxes = &doc.pages[0].boxes;
        assert_eq!(boxes[1].y, cfg.margin_top + 12.0 + 8.0);
    }

    #[test]
    fn empty_section_with_height_acts_as_spacer() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><section height="40"/><text>after</text></document>"#,
            &cfg,
        );
        let boxes = &doc.pages[0].boxes;
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].y, cfg.margin_top + 40.0);
    }

    #[test]
    fn fixed_height_overrides_measured_content() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><section height="60"><text>a</text></section><text>b</text></document>"#,
            &cfg,
        );
        let boxes = &doc.pages[0].boxes;
        assert_eq!(boxes[0].y, cfg.margin_top);
        assert_eq!(boxes[1].y, cfg.margin_top + 60.0);
    }

    #[test]
    fn fixed_height_block_breaks_to_next_page_whole() {
        let mut cfg = config();
        cfg.page_height = 120.0; // content height 40
        let doc = layout_markup(
            r#"<document><section height="30"/><section height="30"><text>moved</text></section></document>"#,
            &cfg,
        );
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].boxes[0].y, cfg.margin_top);
    }

    #[test]
    fn right_alignment_offsets_lines() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><text align="right">hi</text></document>"#,
            &cfg,
        );
        let runs = doc.text_runs(0);
        let line = &runs[0].lines[0];
        // 2 chars × 10pt × 0.5 = 10pt wide, right-aligned in the content width.
        let avail = cfg.page_width - cfg.margin_left - cfg.margin_right;
        assert!((line.x_offset - (avail - 10.0)).abs() < 0.01);
    }

    #[test]
    fn long_text_splits_at_line_boundaries() {
        let mut cfg = config();
        cfg.page_height = 100.0; // content height 20 → 1 line of 12pt fits
        cfg.margin_top = 40.0;
        cfg.margin_bottom = 40.0;
        let many = vec!["word"; 200].join(" ");
        let doc = layout_markup(&format!("<document><text>{many}</text></document>"), &cfg);
        assert!(doc.pages.len() > 1);
        for page in &doc.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= cfg.page_height - cfg.margin_bottom + 0.01);
            }
        }
    }

    #[test]
    fn table_columns_share_width_equally() {
        let cfg = config();
        let doc = layout_markup(
            "<document><table><row><cell>a</cell><cell>b</cell></row></table></document>",
            &cfg,
        );
        let strokes: Vec<&LayoutBox> = doc.pages[0]
            .boxes
            .iter()
            .filter(|b| matches!(b.kind, BoxKind::StrokeRect { .. }))
            .collect();
        assert_eq!(strokes.len(), 2);
        let avail = cfg.page_width - cfg.margin_left - cfg.margin_right;
        assert!((strokes[0].width - avail / 2.0).abs() < 0.01);
        assert!((strokes[1].x - (cfg.margin_left + avail / 2.0)).abs() < 0.01);
    }

    #[test]
    fn explicit_column_widths_respected() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><table><row><cell width="60%">a</cell><cell>b</cell></row></table></document>"#,
            &cfg,
        );
        let strokes: Vec<&LayoutBox> = doc.pages[0]
            .boxes
            .iter()
            .filter(|b| matches!(b.kind, BoxKind::StrokeRect { .. }))
            .collect();
        let avail = cfg.page_width - cfg.margin_left - cfg.margin_right;
        assert!((strokes[0].width - avail * 0.6).abs() < 0.01);
        assert!((strokes[1].width - avail * 0.4).abs() < 0.01);
    }

    #[test]
    fn header_row_gets_fill_and_bold() {
        let cfg = config();
        let doc = layout_markup(
            r#"<document><table><row header="true"><cell>h</cell></row><row><cell>d</cell></row></table></document>"#,
            &cfg,
        );
        let fills = doc.pages[0]
            .boxes
            .iter()
            .filter(|b| matches!(b.kind, BoxKind::FillRect { .. }))
            .count();
        assert_eq!(fills, 1);
        let runs = doc.text_runs(0);
        assert!(runs[0].bold);
        assert!(!runs[1].bold);
    }

    #[test]
    fn row_with_extra_cells_is_an_error() {
        let tree = parse(
            "<document><table>\
             <row><cell>a</cell><cell>b</cell></row>\
             <row><cell>1</cell><cell>2</cell><cell>3</cell></row>\
             </table></document>",
            ParseMode::Strict,
        )
        .unwrap();
        let err = layout(&tree, &config(), &FontManager::default()).unwrap_err();
        match err {
            RenderError::Layout(message) => assert!(message.contains("fixed columns"), "{message}"),
            other => panic!("expected layout error, got {other:?}"),
        }
    }

    #[test]
    fn row_too_tall_for_any_page_is_an_error() {
        let mut cfg = config();
        cfg.page_height = 90.0;
        let many = vec!["word"; 300].join(" ");
        let tree = parse(
            &format!("<document><table><row><cell>{many}</cell></row></table></document>"),
            ParseMode::Strict,
        )
        .unwrap();
        let err = layout(&tree, &cfg, &FontManager::default()).unwrap_err();
        assert!(matches!(err, RenderError::Layout(_)), "{err:?}");
    }
}
