//! Binding resolver – replaces every `data-field` declaration in a parsed
//! template with concrete text from the data record.
//!
//! The output tree has the same node vocabulary as the input but carries no
//! bindings: scalar bindings become literal content, and repeatable
//! constructs (a bound `<row>` inside a table, or a `<section repeat>`)
//! are expanded to one sibling per sequence element in record order.
//! Resolving an already-resolved tree is the identity.

use serde_json::Value;

use crate::error::{RenderError, Result};
use crate::markup::{Node, NodeKind};
use crate::record::{self, Currency};

/// What happens when a field path does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Unresolved paths fail with [`RenderError::Binding`].
    Strict,
    /// Unresolved paths substitute an empty string. The default, so
    /// optional record fields render as blanks instead of failing.
    #[default]
    Lenient,
}

/// Resolve all bindings in `template` against `record`.
pub fn resolve(template: &Node, record: &Value, mode: BindMode, currency: &Currency) -> Result<Node> {
    let mut resolved = resolve_node(template, record, mode, currency, "")?;
    debug_assert_eq!(resolved.len(), 1, "root node never expands");
    Ok(resolved.remove(0))
}

/// Resolve one node within `scope`. Returns multiple nodes when the node
/// is a repeatable construct; `scope_path` is the absolute path of the
/// scope, used only for error reporting inside repeats.
fn resolve_node(
    node: &Node,
    scope: &Value,
    mode: BindMode,
    currency: &Currency,
    scope_path: &str,
) -> Result<Vec<Node>> {
    if let Some(binding) = &node.binding {
        if is_repeatable(node) {
            return expand_repeat(node, binding, scope, mode, currency, scope_path);
        }
        // Scalar binding: content becomes label + formatted value.
        let mut out = node.clone();
        out.binding = None;
        let text = match record::lookup(scope, &binding.path) {
            Some(value) => match record::format_value(value, binding.format, currency) {
                Some(text) => text,
                None => return unresolved(mode, scope_path, &binding.path, node),
            },
            None => return unresolved(mode, scope_path, &binding.path, node),
        };
        out.content = match &binding.label {
            Some(label) => format!("{label}{text}"),
            None => text,
        };
        out.children = resolve_children(&node.children, scope, mode, currency, scope_path)?;
        return Ok(vec![out]);
    }

    let mut out = node.clone();
    if out.repeat {
        log::warn!("<{}> has repeat but no data-field; ignoring", out.kind.tag());
        out.repeat = false;
    }
    out.children = resolve_children(&node.children, scope, mode, currency, scope_path)?;
    Ok(vec![out])
}

fn resolve_children(
    children: &[Node],
    scope: &Value,
    mode: BindMode,
    currency: &Currency,
    scope_path: &str,
) -> Result<Vec<Node>> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        out.extend(resolve_node(child, scope, mode, currency, scope_path)?);
    }
    Ok(out)
}

/// A bound row directly inside a table, or a bound section marked
/// `repeat`, expands over a sequence. All other bound nodes are scalar.
fn is_repeatable(node: &Node) -> bool {
    match node.kind {
        NodeKind::Row => true,
        NodeKind::Section => node.repeat,
        _ => false,
    }
}

/// Expand a repeatable node to one copy per sequence element, resolving
/// descendant bindings relative to each element.
fn expand_repeat(
    node: &Node,
    binding: &crate::markup::Binding,
    scope: &Value,
    mode: BindMode,
    currency: &Currency,
    scope_path: &str,
) -> Result<Vec<Node>> {
    let items = match record::lookup(scope, &binding.path) {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            if mode == BindMode::Strict {
                return Err(RenderError::Binding {
                    path: join_path(scope_path, &binding.path),
                });
            }
            log::warn!(
                "repeat path `{}` is not a sequence; expanding to nothing",
                binding.path
            );
            &[]
        }
        None => {
            if mode == BindMode::Strict {
                return Err(RenderError::Binding {
                    path: join_path(scope_path, &binding.path),
                });
            }
            &[]
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let item_path = format!("{}.{index}", join_path(scope_path, &binding.path));
        let mut copy = node.clone();
        copy.binding = None;
        copy.repeat = false;
        copy.children = resolve_children(&node.children, item, mode, currency, &item_path)?;
        out.push(copy);
    }
    Ok(out)
}

fn unresolved(mode: BindMode, scope_path: &str, path: &str, node: &Node) -> Result<Vec<Node>> {
    if mode == BindMode::Strict {
        return Err(RenderError::Binding {
            path: join_path(scope_path, path),
        });
    }
    let mut out = node.clone();
    out.binding = None;
    out.content = node
        .binding
        .as_ref()
        .and_then(|b| b.label.clone())
        .unwrap_or_default();
    out.children.clear();
    Ok(vec![out])
}

fn join_path(scope_path: &str, path: &str) -> String {
    if scope_path.is_empty() {
        path.to_string()
    } else {
        format!("{scope_path}.{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, ParseMode};
    use serde_json::json;

    fn resolve_markup(markup: &str, record: &Value, mode: BindMode) -> Result<Node> {
        let tree = parse(markup, ParseMode::Strict)?;
        resolve(&tree, record, mode, &Currency::default())
    }

    #[test]
    fn scalar_binding_becomes_content() {
        let record = json!({ "invoice": { "number": "FV-2024-001" } });
        let root = resolve_markup(
            r#"<document><text data-field="invoice.number" data-label="Invoice: "/></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap();
        let text = &root.children[0];
        assert_eq!(text.content, "Invoice: FV-2024-001");
        assert!(text.binding.is_none());
    }

    #[test]
    fn currency_format_applied() {
        let record = json!({ "totals": { "total": 1845.0 } });
        let root = resolve_markup(
            r#"<document><text data-field="totals.total" data-format="currency"/></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap();
        assert_eq!(root.children[0].content, "PLN zł 1 845,00");
    }

    #[test]
    fn row_expansion_preserves_order() {
        let record = json!({
            "line_items": [
                { "description": "Design", "amount": 100.0 },
                { "description": "Build", "amount": 200.0 },
                { "description": "Ship", "amount": 50.0 },
            ]
        });
        let root = resolve_markup(
            r#"<document><table>
                 <row header="true"><cell>Item</cell><cell>Amount</cell></row>
                 <row data-field="line_items">
                   <cell data-field="description"/>
                   <cell data-field="amount" data-format="number"/>
                 </row>
               </table></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap();
        let table = &root.children[0];
        assert_eq!(table.children.len(), 4);
        assert!(table.children[0].header);
        let descriptions: Vec<&str> = table.children[1..]
            .iter()
            .map(|row| row.children[0].content.as_str())
            .collect();
        assert_eq!(descriptions, ["Design", "Build", "Ship"]);
        assert_eq!(table.children[3].children[1].content, "50.00");
    }

    #[test]
    fn empty_sequence_expands_to_no_rows() {
        let record = json!({ "line_items": [] });
        let root = resolve_markup(
            r#"<document><table><row data-field="line_items"><cell data-field="x"/></row></table></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap();
        assert!(root.children[0].children.is_empty());
    }

    #[test]
    fn repeated_section_resolves_relative_paths() {
        let record = json!({ "notes": [ { "body": "one" }, { "body": "two" } ] });
        let root = resolve_markup(
            r#"<document><section repeat="true" data-field="notes"><text data-field="body"/></section></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].children[0].content, "one");
        assert_eq!(root.children[1].children[0].content, "two");
        assert!(!root.children[0].repeat);
    }

    #[test]
    fn strict_fails_on_missing_path() {
        let record = json!({ "sender": {} });
        let err = resolve_markup(
            r#"<document><text data-field="sender.name"/></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RenderError::Binding {
                path: "sender.name".to_string()
            }
        );
    }

    #[test]
    fn strict_error_inside_repeat_names_full_path() {
        let record = json!({ "line_items": [ { "amount": 1.0 }, {} ] });
        let err = resolve_markup(
            r#"<document><table><row data-field="line_items"><cell data-field="amount"/></row></table></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RenderError::Binding {
                path: "line_items.1.amount".to_string()
            }
        );
    }

    #[test]
    fn lenient_substitutes_empty_string() {
        let record = json!({});
        let root = resolve_markup(
            r#"<document><text data-field="sender.name" data-label="From: "/><text data-field="missing"/></document>"#,
            &record,
            BindMode::Lenient,
        )
        .unwrap();
        assert_eq!(root.children[0].content, "From: ");
        assert_eq!(root.children[1].content, "");
    }

    #[test]
    fn type_mismatch_is_unresolved() {
        // Path descends into a scalar.
        let record = json!({ "sender": "Acme" });
        let err = resolve_markup(
            r#"<document><text data-field="sender.name"/></document>"#,
            &record,
            BindMode::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Binding { .. }));

        // Composite value on a scalar binding.
        let record = json!({ "sender": { "name": { "first": "A" } } });
        let root = resolve_markup(
            r#"<document><text data-field="sender.name"/></document>"#,
            &record,
            BindMode::Lenient,
        )
        .unwrap();
        assert_eq!(root.children[0].content, "");
    }

    #[test]
    fn resolution_is_idempotent() {
        let record = json!({
            "title": "Invoice",
            "line_items": [ { "description": "A", "amount": 1.0 } ],
        });
        let markup = r#"<document>
            <text data-field="title"/>
            <table><row data-field="line_items"><cell data-field="description"/></row></table>
        </document>"#;
        let once = resolve_markup(markup, &record, BindMode::Strict).unwrap();
        let twice = resolve(&once, &record, BindMode::Strict, &Currency::default()).unwrap();
        assert_eq!(once, twice);
    }
}
