//! Markup parser – converts an invoice template string into a typed node
//! tree.
//!
//! The tag vocabulary is closed: `document`, `section`, `table`, `row`,
//! `cell`, `text`, `line`. Data binding is declared with `data-field`
//! attributes and resolved later by [`crate::binding`]; this module has no
//! knowledge of the data record or of layout.

use std::collections::HashMap;

use crate::error::{RenderError, Result};
use crate::style::NodeStyle;

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// How the parser treats tags outside the closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Unknown tags are a syntax error.
    #[default]
    Strict,
    /// Unknown tags are accepted as opaque section-like containers.
    Lenient,
}

/// The kind of a supported element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Section,
    Table,
    Row,
    Cell,
    Text,
    /// Horizontal divider (`<line/>`).
    Rule,
}

impl NodeKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "document" => Some(NodeKind::Document),
            "section" => Some(NodeKind::Section),
            "table" => Some(NodeKind::Table),
            "row" => Some(NodeKind::Row),
            "cell" => Some(NodeKind::Cell),
            "text" => Some(NodeKind::Text),
            "line" => Some(NodeKind::Rule),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Section => "section",
            NodeKind::Table => "table",
            NodeKind::Row => "row",
            NodeKind::Cell => "cell",
            NodeKind::Text => "text",
            NodeKind::Rule => "line",
        }
    }
}

/// Output formatting applied to a resolved data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Grouped two-decimal amount plus the configured currency code/symbol.
    Currency,
    /// Grouped two-decimal amount.
    Number,
}

impl ValueFormat {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "currency" => Some(ValueFormat::Currency),
            "number" => Some(ValueFormat::Number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueFormat::Currency => "currency",
            ValueFormat::Number => "number",
        }
    }
}

/// A declared data binding, removed from the node once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Dot-delimited field path, e.g. `sender.name` or `items.0.amount`.
    pub path: String,
    pub format: Option<ValueFormat>,
    /// Literal prefix concatenated before the resolved value.
    pub label: Option<String>,
}

/// A node in the template tree. After binding resolution the tree has the
/// same shape but every `binding` is `None` and repeated constructs are
/// expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub style: NodeStyle,
    pub binding: Option<Binding>,
    /// Section marked repeatable (`repeat="true"`).
    pub repeat: bool,
    /// Table row re-emitted after every in-table page break.
    pub header: bool,
    /// Literal or resolved text content (text nodes, bound cells).
    pub content: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            style: NodeStyle::default(),
            binding: None,
            repeat: false,
            header: false,
            content: String::new(),
            children: Vec::new(),
        }
    }

    /// A text leaf with literal content.
    pub fn text(content: impl Into<String>) -> Self {
        let mut node = Node::new(NodeKind::Text);
        node.content = content.into();
        node
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Serialise this tree back to canonical markup, such that
    /// `parse(node.to_markup(), ParseMode::Strict)` reproduces the tree.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, 0);
        out
    }

    fn write_markup(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(self.kind.tag());
        if let Some(b) = &self.binding {
            push_attr(out, "data-field", &b.path);
            if let Some(f) = b.format {
                push_attr(out, "data-format", f.as_str());
            }
            if let Some(l) = &b.label {
                push_attr(out, "data-label", l);
            }
        }
        if self.repeat {
            push_attr(out, "repeat", "true");
        }
        if self.header {
            push_attr(out, "header", "true");
        }
        self.style.write_attrs(out);

        if self.children.is_empty() && self.content.is_empty() {
            out.push_str("/>\n");
        } else if self.children.is_empty() {
            // Leaf with content: keep it inline so the single trim round
            // leaves the content untouched.
            out.push('>');
            out.push_str(&escape(&self.content));
            out.push_str("</");
            out.push_str(self.kind.tag());
            out.push_str(">\n");
        } else {
            out.push_str(">\n");
            for child in &self.children {
                child.write_markup(out, depth + 1);
            }
            out.push_str(&indent);
            out.push_str("</");
            out.push_str(self.kind.tag());
            out.push_str(">\n");
        }
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parser – single top-down scan
// ---------------------------------------------------------------------------

/// Parse a markup template into its root node.
///
/// The root element must be `<document>`. Fails with
/// [`RenderError::MarkupSyntax`] on malformed text and
/// [`RenderError::MarkupStructure`] on violated nesting invariants.
pub fn parse(markup: &str, mode: ParseMode) -> Result<Node> {
    let mut parser = Parser {
        input: markup,
        pos: 0,
        mode,
    };
    let nodes = parser.parse_nodes()?;
    if !parser.eof() {
        // Only a stray close tag can stop parse_nodes early at top level.
        return Err(RenderError::syntax(parser.pos, "unexpected close tag"));
    }

    let mut elements = nodes.into_iter();
    let root = match (elements.next(), elements.next()) {
        (Some(root), None) => root,
        (None, _) => {
            return Err(RenderError::MarkupStructure(
                "template is empty; expected a <document> root".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(RenderError::MarkupStructure(
                "template must have a single <document> root".to_string(),
            ))
        }
    };
    if root.kind != NodeKind::Document {
        return Err(RenderError::MarkupStructure(format!(
            "root element must be <document>, found <{}>",
            root.kind.tag()
        )));
    }
    Ok(root)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    mode: ParseMode,
}

impl<'a> Parser<'a> {
    fn parse_nodes(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() || self.starts_with("</") {
                break;
            }
            if self.starts_with("<!--") {
                self.skip_comment()?;
                continue;
            }
            if self.starts_with("<?") || self.starts_with("<!") {
                self.skip_prologue()?;
                continue;
            }
            if self.starts_with("<") {
                nodes.push(self.parse_element()?);
            } else if let Some(text) = self.parse_text()? {
                nodes.push(text);
            }
        }
        Ok(nodes)
    }

    /// Character data up to the next tag. Inter-element whitespace is
    /// insignificant: the run is trimmed once, and dropped entirely when
    /// nothing remains.
    fn parse_text(&mut self) -> Result<Option<Node>> {
        let start = self.pos;
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        let raw = &self.input[start..self.pos];
        let decoded = decode_entities(raw, start)?;
        let trimmed = decoded.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Node::text(trimmed)))
        }
    }

    fn parse_element(&mut self) -> Result<Node> {
        let open_pos = self.pos;
        self.advance(1); // '<'
        let tag = self.parse_name();
        if tag.is_empty() {
            return Err(RenderError::syntax(open_pos, "expected tag name after `<`"));
        }

        let kind = match NodeKind::from_tag(&tag) {
            Some(kind) => kind,
            None if self.mode == ParseMode::Lenient => {
                log::warn!("unknown tag <{tag}> treated as section");
                NodeKind::Section
            }
            None => {
                return Err(RenderError::syntax(open_pos, format!("unknown tag <{tag}>")));
            }
        };

        // Attributes
        let mut attrs: HashMap<String, String> = HashMap::new();
        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(RenderError::syntax(
                    open_pos,
                    format!("unterminated tag <{tag}>"),
                ));
            }
            if self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute()?;
            attrs.insert(key, value);
        }

        let mut node = Node::new(kind);
        node.style = NodeStyle::from_attributes(&attrs);
        node.binding = binding_from_attrs(&attrs);
        node.repeat = flag(&attrs, "repeat");
        node.header = flag(&attrs, "header");

        if self.starts_with("/>") {
            self.advance(2);
            return self.finish_element(node, open_pos);
        }
        self.advance(1); // '>'

        node.children = self.parse_nodes()?;

        // Close tag must match the open tag.
        if !self.starts_with("</") {
            return Err(RenderError::syntax(
                open_pos,
                format!("unterminated element <{tag}>"),
            ));
        }
        let close_pos = self.pos;
        self.advance(2);
        let close_name = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with(">") {
            return Err(RenderError::syntax(close_pos, "unterminated close tag"));
        }
        self.advance(1);
        if close_name != tag {
            return Err(RenderError::syntax(
                close_pos,
                format!("mismatched close tag: expected </{tag}>, found </{close_name}>"),
            ));
        }

        self.finish_element(node, open_pos)
    }

    /// Post-children fixups and nesting validation.
    fn finish_element(&self, mut node: Node, _open_pos: usize) -> Result<Node> {
        match node.kind {
            NodeKind::Text => {
                // Text is a leaf: fold parsed character data into content.
                let mut content = String::new();
                for child in node.children.drain(..) {
                    if child.kind != NodeKind::Text {
                        return Err(RenderError::MarkupStructure(format!(
                            "<text> cannot contain <{}> children",
                            child.kind.tag()
                        )));
                    }
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(&child.content);
                }
                node.content = content;
            }
            NodeKind::Table => {
                for child in &node.children {
                    if child.kind != NodeKind::Row {
                        return Err(RenderError::MarkupStructure(format!(
                            "<table> children must be <row>, found <{}>",
                            child.kind.tag()
                        )));
                    }
                }
            }
            NodeKind::Row => {
                for child in &node.children {
                    if child.kind != NodeKind::Cell {
                        return Err(RenderError::MarkupStructure(format!(
                            "<row> children must be <cell>, found <{}>",
                            child.kind.tag()
                        )));
                    }
                }
            }
            _ => {}
        }
        for child in &node.children {
            if child.kind == NodeKind::Document {
                return Err(RenderError::MarkupStructure(
                    "<document> must be the root element".to_string(),
                ));
            }
        }
        Ok(node)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> Result<(String, String)> {
        let key_pos = self.pos;
        let key = self.parse_name();
        if key.is_empty() {
            return Err(RenderError::syntax(key_pos, "expected attribute name"));
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            // Bare attribute, e.g. `repeat`.
            return Ok((key, String::new()));
        }
        self.advance(1);
        self.skip_whitespace();

        let quote = match self.eof() {
            false if self.starts_with("\"") => '"',
            false if self.starts_with("'") => '\'',
            _ => {
                return Err(RenderError::syntax(
                    self.pos,
                    format!("attribute `{key}` value must be quoted"),
                ));
            }
        };
        self.advance(1);
        let start = self.pos;
        while !self.eof() && self.current_char() != quote {
            self.advance(1);
        }
        if self.eof() {
            return Err(RenderError::syntax(
                start,
                format!("unterminated value for attribute `{key}`"),
            ));
        }
        let raw = &self.input[start..self.pos];
        self.advance(1); // closing quote
        let value = decode_entities(raw, start)?;
        Ok((key, value))
    }

    fn skip_comment(&mut self) -> Result<()> {
        let start = self.pos;
        self.advance(4); // "<!--"
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if self.eof() {
            return Err(RenderError::syntax(start, "unterminated comment"));
        }
        self.advance(3);
        Ok(())
    }

    fn skip_prologue(&mut self) -> Result<()> {
        let start = self.pos;
        while !self.eof() && !self.starts_with(">") {
            self.advance(1);
        }
        if self.eof() {
            return Err(RenderError::syntax(start, "unterminated declaration"));
        }
        self.advance(1);
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn binding_from_attrs(attrs: &HashMap<String, String>) -> Option<Binding> {
    let path = attrs.get("data-field")?.clone();
    let format = attrs.get("data-format").and_then(|f| {
        let parsed = ValueFormat::from_str(f);
        if parsed.is_none() {
            log::warn!("ignoring unknown data-format `{f}`");
        }
        parsed
    });
    let label = attrs.get("data-label").cloned();
    Some(Binding {
        path,
        format,
        label,
    })
}

fn flag(attrs: &HashMap<String, String>, key: &str) -> bool {
    match attrs.get(key) {
        Some(v) => v != "false",
        None => false,
    }
}

/// Decode standard entities. `base` is the byte offset of `raw` within the
/// template, used to report malformed entities at their exact position.
fn decode_entities(raw: &str, base: usize) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            let c = raw[i..].chars().next().unwrap_or('\0');
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        let rest = &raw[i..];
        let end = match rest.find(';') {
            Some(end) if end <= 8 => end,
            _ => {
                return Err(RenderError::syntax(base + i, "malformed entity"));
            }
        };
        let name = &rest[1..end];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => name
                .strip_prefix('#')
                .and_then(|digits| digits.parse::<u32>().ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => {
                return Err(RenderError::syntax(
                    base + i,
                    format!("unknown entity `&{name};`"),
                ));
            }
        }
        i += end + 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Align;

    #[test]
    fn parse_minimal_document() {
        let root = parse("<document><section><text>Hello</text></section></document>", ParseMode::Strict).unwrap();
        assert_eq!(root.kind, NodeKind::Document);
        assert_eq!(root.children.len(), 1);
        let section = &root.children[0];
        assert_eq!(section.kind, NodeKind::Section);
        assert_eq!(section.children[0].content, "Hello");
    }

    #[test]
    fn parse_data_field_attributes() {
        let root = parse(
            r#"<document><text data-field="sender.name" data-format="currency" data-label="From: "/></document>"#,
            ParseMode::Strict,
        )
        .unwrap();
        let text = &root.children[0];
        let binding = text.binding.as_ref().unwrap();
        assert_eq!(binding.path, "sender.name");
        assert_eq!(binding.format, Some(ValueFormat::Currency));
        assert_eq!(binding.label.as_deref(), Some("From: "));
    }

    #[test]
    fn stray_character_data_becomes_text_node() {
        let root = parse("<document><section>loose words</section></document>", ParseMode::Strict).unwrap();
        let section = &root.children[0];
        assert_eq!(section.children.len(), 1);
        assert_eq!(section.children[0].kind, NodeKind::Text);
        assert_eq!(section.children[0].content, "loose words");
    }

    #[test]
    fn inner_whitespace_preserved_ends_trimmed() {
        let root = parse("<document><text>  a\n  b  </text></document>", ParseMode::Strict).unwrap();
        assert_eq!(root.children[0].content, "a\n  b");
    }

    #[test]
    fn entities_decode_in_text_and_attributes() {
        let root = parse(
            r#"<document><text data-field="q" data-label="A &amp; B: ">x &lt; y &#8364;</text></document>"#,
            ParseMode::Strict,
        )
        .unwrap();
        let text = &root.children[0];
        assert_eq!(text.content, "x < y \u{20AC}");
        assert_eq!(
            text.binding.as_ref().unwrap().label.as_deref(),
            Some("A & B: ")
        );
    }

    #[test]
    fn label_without_field_is_not_a_binding() {
        let root = parse(
            r#"<document><text data-label="Total: ">literal</text></document>"#,
            ParseMode::Strict,
        )
        .unwrap();
        assert!(root.children[0].binding.is_none());
    }

    #[test]
    fn malformed_entity_is_a_syntax_error() {
        let err = parse("<document><text>broken &am text</text></document>", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, RenderError::MarkupSyntax { .. }), "{err:?}");
    }

    #[test]
    fn mismatched_close_tag() {
        let err = parse("<document><section></row></document>", ParseMode::Strict).unwrap_err();
        match err {
            RenderError::MarkupSyntax { message, .. } => {
                assert!(message.contains("</section>"), "{message}");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_element() {
        let err = parse("<document><section>", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, RenderError::MarkupSyntax { .. }));
    }

    #[test]
    fn unknown_tag_strict_vs_lenient() {
        let markup = "<document><footer><text>hi</text></footer></document>";
        assert!(matches!(
            parse(markup, ParseMode::Strict),
            Err(RenderError::MarkupSyntax { .. })
        ));
        let root = parse(markup, ParseMode::Lenient).unwrap();
        assert_eq!(root.children[0].kind, NodeKind::Section);
    }

    #[test]
    fn table_rejects_non_row_children() {
        let err = parse("<document><table><cell>x</cell></table></document>", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, RenderError::MarkupStructure(_)), "{err:?}");

        let err = parse(
            "<document><table><row><text>x</text></row></table></document>",
            ParseMode::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::MarkupStructure(_)), "{err:?}");
    }

    #[test]
    fn root_must_be_document() {
        let err = parse("<section/>", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, RenderError::MarkupStructure(_)));
    }

    #[test]
    fn comments_and_prologue_skipped() {
        let root = parse(
            "<?xml version=\"1.0\"?><!-- template --><document><line/></document>",
            ParseMode::Strict,
        )
        .unwrap();
        assert_eq!(root.children[0].kind, NodeKind::Rule);
    }

    #[test]
    fn pretty_print_roundtrip() {
        let markup = r#"<document>
  <section spacing="8">
    <text font-size="14" font-weight="bold" align="center">Invoice</text>
    <line/>
  </section>
  <table>
    <row header="true"><cell width="60%">Item</cell><cell align="right">Amount</cell></row>
    <row data-field="line_items"><cell data-field="description"/><cell data-field="amount" data-format="number" align="right"/></row>
  </table>
</document>"#;
        let tree = parse(markup, ParseMode::Strict).unwrap();
        let printed = tree.to_markup();
        let reparsed = parse(&printed, ParseMode::Strict).unwrap();
        assert_eq!(tree, reparsed);
    }

    #[test]
    fn pretty_print_escapes_entities() {
        let mut tree = Node::new(NodeKind::Document);
        tree.children.push(Node::text("a < b & \"c\""));
        let reparsed = parse(&tree.to_markup(), ParseMode::Strict).unwrap();
        assert_eq!(tree, reparsed);
    }

    #[test]
    fn parse_position_points_at_offender() {
        let markup = "<document><bogus/></document>";
        match parse(markup, ParseMode::Strict).unwrap_err() {
            RenderError::MarkupSyntax { position, .. } => {
                assert_eq!(position, markup.find("<bogus").unwrap());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn align_attribute_resolves() {
        let root = parse(r#"<document><text align="right">x</text></document>"#, ParseMode::Strict).unwrap();
        assert_eq!(root.children[0].style.align, Align::Right);
    }
}
