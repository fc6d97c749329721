//! Font metrics and text measurement using `ttf-parser`.
//!
//! The built-in faces (Helvetica, Times, Courier) carry no glyph data, so
//! they are measured with an average-width heuristic; callers can load a
//! real TTF/OTF face to get exact advances. Measurement is deterministic
//! either way, which the reproducible-output guarantee depends on.

use std::collections::HashMap;

use crate::error::{RenderError, Result};

/// Multiple of the font size used as line height.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;
/// Fallback ascender fraction when no face metrics are loaded.
pub const ASCENT_FACTOR: f32 = 0.75;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
        }
    }
}

/// Manages loaded fonts.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: FontKey,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            default_key: FontKey::new("Helvetica", false),
        }
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(&mut self, family: &str, bold: bool, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| RenderError::Layout(format!("failed to parse font `{family}`: {e}")))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        let key = FontKey::new(family, bold);
        if self.fonts.is_empty() {
            self.default_key = key.clone();
        }
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Register synthetic Helvetica-like metrics so measurement works
    /// without any font file.
    pub fn ensure_default(&mut self) {
        if !self.fonts.is_empty() {
            return;
        }
        for bold in [false, true] {
            self.fonts.insert(
                FontKey::new("Helvetica", bold),
                FontData {
                    bytes: Vec::new(),
                    units_per_em: 1000.0,
                    ascender: 750.0,
                    descender: -250.0,
                },
            );
        }
        self.default_key = FontKey::new("Helvetica", false);
    }

    /// Get font data for a key, falling back to the default.
    fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts.get(key).or_else(|| self.fonts.get(&self.default_key))
    }

    /// Measure the width of a string at a given font size, in points.
    /// With real font bytes we sum glyph advances; otherwise an average
    /// character width heuristic (0.5 × font_size, 0.55 when bold).
    pub fn text_width(&self, text: &str, font_size: f32, family: &str, bold: bool) -> f32 {
        let heuristic = |bold: bool| {
            let avg = if bold { 0.55 } else { 0.5 };
            text.chars().count() as f32 * font_size * avg
        };
        let Some(data) = self.get(&FontKey::new(family, bold)) else {
            return heuristic(bold);
        };
        if data.bytes.is_empty() {
            return heuristic(bold);
        }

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                let mut width = 0.0f32;
                for ch in text.chars() {
                    match face.glyph_index(ch) {
                        Some(gid) => {
                            width += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
                        }
                        None => width += font_size * 0.5,
                    }
                }
                width
            }
            Err(_) => heuristic(bold),
        }
    }

    /// Line height in points.
    pub fn line_height(&self, font_size: f32) -> f32 {
        font_size * LINE_HEIGHT_FACTOR
    }

    /// Baseline offset from the top of the line, in points.
    pub fn ascender(&self, font_size: f32, family: &str, bold: bool) -> f32 {
        match self.get(&FontKey::new(family, bold)) {
            Some(data) => data.ascender * (font_size / data.units_per_em),
            None => font_size * ASCENT_FACTOR,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        let mut mgr = Self::new();
        mgr.ensure_default();
        mgr
    }
}

/// Word-wrap text to fit within `max_width` points. Returns one entry per
/// line; explicit newlines always break.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    family: &str,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in &words {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            let w = fonts.text_width(&candidate, font_size, family, bold);
            if w > max_width && !current.is_empty() {
                lines.push(current);
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.text_width("Hello", 16.0, "Helvetica", false);
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let wb = mgr.text_width("Hello", 16.0, "Helvetica", true);
        assert!(wb > w);
    }

    #[test]
    fn line_metrics() {
        let mgr = FontManager::default();
        assert!((mgr.line_height(10.0) - 12.0).abs() < f32::EPSILON);
        assert!((mgr.ascender(10.0, "Helvetica", false) - 7.5).abs() < 0.01);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, "Helvetica", false, 60.0, &mgr);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
    }

    #[test]
    fn wrap_preserves_explicit_newlines() {
        let mgr = FontManager::default();
        let lines = wrap_text("a\nb", 10.0, "Helvetica", false, 500.0, &mgr);
        assert_eq!(lines, ["a", "b"]);
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let mgr = FontManager::default();
        let lines = wrap_text("tiny incomprehensibilities", 16.0, "Helvetica", false, 50.0, &mgr);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "incomprehensibilities");
    }
}
