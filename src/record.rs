//! Data record access – dot-path navigation over a JSON value and the
//! scalar formatting rules used when bindings resolve.

use serde_json::Value;

use crate::markup::ValueFormat;

/// Currency code and symbol used by `data-format="currency"`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
}

impl Default for Currency {
    fn default() -> Self {
        Self {
            code: "PLN".to_string(),
            symbol: "zł".to_string(),
        }
    }
}

/// Navigate `record` along a dot-delimited `path`. Keys index mappings,
/// decimal segments index sequences. Returns `None` for a missing key,
/// out-of-range index, null, or a path that descends into a scalar.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut value = record;
    for part in path.split('.') {
        value = match value {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Default string representation of a scalar. Strings are verbatim,
/// integers unchanged, non-integral numbers fixed to two places. Returns
/// `None` for mappings and sequences, which have no scalar rendering.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| format!("{f:.2}"))
            }
        }
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Render a scalar under an optional explicit format. A format on a
/// non-numeric value falls back to the default rendering.
pub fn format_value(value: &Value, format: Option<ValueFormat>, currency: &Currency) -> Option<String> {
    if let (Some(format), Some(amount)) = (format, value.as_f64()) {
        return Some(match format {
            ValueFormat::Number => format_amount(amount),
            ValueFormat::Currency => format_currency(amount, currency),
        });
    }
    scalar_text(value)
}

/// Two-place amount with space thousands separators: `1 234.56`.
pub fn format_amount(amount: f64) -> String {
    group_thousands(amount)
}

/// Amount prefixed with code and symbol, comma decimal: `PLN zł 1 234,56`.
pub fn format_currency(amount: f64, currency: &Currency) -> String {
    let grouped = group_thousands(amount).replace('.', ",");
    format!("{} {} {}", currency.code, currency.symbol, grouped)
}

fn group_thousands(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));
    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(fixed.len() + digits.len() / 3 + 1);
    if amount < 0.0 {
        grouped.push('-');
    }
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*d as char);
    }
    grouped.push('.');
    grouped.push_str(frac_part);
    grouped
}
