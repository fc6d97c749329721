//! Style resolver – maps the markup attribute vocabulary (`align`, `width`,
//! `colspan`, `font-size`, `font-weight`, `color`, `spacing`, `height`, and
//! the inline `style` declaration list) to a flat [`NodeStyle`] struct
//! resolved once at parse time, so later stages never do string dispatch.

use std::collections::HashMap;

/// Horizontal alignment of text within its available width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Align::Left),
            "center" => Some(Align::Center),
            "right" => Some(Align::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

/// Explicit width of a table column, in points or as a percentage of the
/// content width.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Width {
    #[default]
    Auto,
    Pt(f32),
    Percent(f32),
}

/// Fully resolved presentation attributes for a single markup node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    /// Font size in points; `None` inherits the page default.
    pub font_size: Option<f32>,
    pub bold: bool,
    /// Text / stroke colour, RGB in 0.0–1.0.
    pub color: [f32; 3],
    pub align: Align,
    /// Column width (meaningful on cells of the first table row).
    pub width: Width,
    /// Number of table columns this cell spans.
    pub colspan: u32,
    /// Vertical gap, in points, added after a section.
    pub spacing: f32,
    /// Explicit element height in points (rules, spacer sections).
    pub height: Option<f32>,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            font_size: None,
            bold: false,
            color: BLACK,
            align: Align::Left,
            width: Width::Auto,
            colspan: 1,
            spacing: 0.0,
            height: None,
        }
    }
}

pub const BLACK: [f32; 3] = [0.0, 0.0, 0.0];

impl NodeStyle {
    /// Resolve the raw attribute map into a `NodeStyle`. Named attributes
    /// are applied first; declarations in the `style` attribute win over
    /// them. Unknown keys and unparseable values are ignored with a warning
    /// (forward compatibility).
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Self {
        let mut style = NodeStyle::default();
        for (key, value) in attrs {
            if key != "style" {
                style.apply(key, value);
            }
        }
        if let Some(decls) = attrs.get("style") {
            for decl in decls.split(';') {
                let decl = decl.trim();
                if decl.is_empty() {
                    continue;
                }
                match decl.split_once(':') {
                    Some((key, value)) => style.apply(key.trim(), value.trim()),
                    None => log::warn!("ignoring malformed style declaration `{decl}`"),
                }
            }
        }
        style
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "font-size" => match value.parse::<f32>() {
                Ok(v) if v > 0.0 => self.font_size = Some(v),
                _ => log::warn!("ignoring invalid font-size `{value}`"),
            },
            "font-weight" => self.bold = value == "bold",
            "color" => match parse_hex_color(value) {
                Some(c) => self.color = c,
                None => log::warn!("ignoring invalid color `{value}`"),
            },
            "align" => match Align::from_str(value) {
                Some(a) => self.align = a,
                None => log::warn!("ignoring invalid align `{value}`"),
            },
            "width" => match parse_width(value) {
                Some(w) => self.width = w,
                None => log::warn!("ignoring invalid width `{value}`"),
            },
            "colspan" => match value.parse::<u32>() {
                Ok(v) if v >= 1 => self.colspan = v,
                _ => log::warn!("ignoring invalid colspan `{value}`"),
            },
            "spacing" => match value.parse::<f32>() {
                Ok(v) if v >= 0.0 => self.spacing = v,
                _ => log::warn!("ignoring invalid spacing `{value}`"),
            },
            "height" => match value.parse::<f32>() {
                Ok(v) if v > 0.0 => self.height = Some(v),
                _ => log::warn!("ignoring invalid height `{value}`"),
            },
            // data-* and structural attributes are handled by the parser;
            // anything else is ignored for forward compatibility.
            _ => {}
        }
    }

    /// Append this style's non-default fields as markup attributes. Inverse
    /// of [`NodeStyle::from_attributes`] for the canonical pretty-printer.
    pub fn write_attrs(&self, out: &mut String) {
        use std::fmt::Write;
        if let Some(size) = self.font_size {
            let _ = write!(out, " font-size=\"{size}\"");
        }
        if self.bold {
            out.push_str(" font-weight=\"bold\"");
        }
        if self.color != BLACK {
            let _ = write!(out, " color=\"{}\"", format_hex_color(self.color));
        }
        if self.align != Align::Left {
            let _ = write!(out, " align=\"{}\"", self.align.as_str());
        }
        match self.width {
            Width::Auto => {}
            Width::Pt(v) => {
                let _ = write!(out, " width=\"{v}\"");
            }
            Width::Percent(v) => {
                let _ = write!(out, " width=\"{v}%\"");
            }
        }
        if self.colspan > 1 {
            let _ = write!(out, " colspan=\"{}\"", self.colspan);
        }
        if self.spacing > 0.0 {
            let _ = write!(out, " spacing=\"{}\"", self.spacing);
        }
        if let Some(h) = self.height {
            let _ = write!(out, " height=\"{h}\"");
        }
    }
}

fn parse_width(value: &str) -> Option<Width> {
    if let Some(pct) = value.strip_suffix('%') {
        let v: f32 = pct.trim().parse().ok()?;
        (v > 0.0).then_some(Width::Percent(v))
    } else {
        let v: f32 = value.parse().ok()?;
        (v > 0.0).then_some(Width::Pt(v))
    }
}

/// Parse a `#rrggbb` colour into RGB components in 0.0–1.0.
pub fn parse_hex_color(value: &str) -> Option<[f32; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .unwrap_or(0.0)
    };
    Some([channel(0), channel(2), channel(4)])
}

fn format_hex_color(color: [f32; 3]) -> String {
    let byte = |v: f32| (v * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        byte(color[0]),
        byte(color[1]),
        byte(color[2])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolve_named_attributes() {
        let style = NodeStyle::from_attributes(&attrs(&[
            ("font-size", "12"),
            ("font-weight", "bold"),
            ("align", "right"),
            ("colspan", "2"),
        ]));
        assert_eq!(style.font_size, Some(12.0));
        assert!(style.bold);
        assert_eq!(style.align, Align::Right);
        assert_eq!(style.colspan, 2);
    }

    #[test]
    fn style_declarations_override_named_attributes() {
        let style = NodeStyle::from_attributes(&attrs(&[
            ("align", "left"),
            ("style", "align: center; color: #336699"),
        ]));
        assert_eq!(style.align, Align::Center);
        assert_eq!(style.color, parse_hex_color("#336699").unwrap());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let style = NodeStyle::from_attributes(&attrs(&[
            ("font-size", "huge"),
            ("color", "red"),
            ("colspan", "0"),
        ]));
        assert_eq!(style, NodeStyle::default());
    }

    #[test]
    fn width_percent_and_points() {
        assert_eq!(parse_width("120"), Some(Width::Pt(120.0)));
        assert_eq!(parse_width("35%"), Some(Width::Percent(35.0)));
        assert_eq!(parse_width("-3"), None);
    }

    #[test]
    fn hex_color_roundtrip() {
        let c = parse_hex_color("#e0e0e0").unwrap();
        assert_eq!(format_hex_color(c), "#e0e0e0");
        assert!(parse_hex_color("#xyzxyz").is_none());
        assert!(parse_hex_color("e0e0e0").is_none());
    }
}
