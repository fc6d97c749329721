//! Invoice totals – net, VAT and grand total derived from line items.
//!
//! Runs before binding resolution so templates can reference
//! `totals.net_amount`, `totals.vat_amount` and `totals.total` whether or
//! not the caller supplied them.

use serde_json::{json, Value};

pub const DEFAULT_VAT_RATE: f64 = 23.0;

/// Net, VAT and total for a set of line items.
///
/// With `apply_to_net` the VAT is added on top of the summed amounts;
/// without it the amounts are treated as gross and the VAT is extracted.
pub fn calculate_totals(line_items: &[Value], vat_rate: f64, apply_to_net: bool) -> Value {
    let mut net_amount: f64 = line_items
        .iter()
        .filter_map(|item| item.get("amount").and_then(Value::as_f64))
        .sum();

    let vat_amount = if apply_to_net {
        // VAT only applies to a positive net; a credit balance stays untaxed.
        if net_amount > 0.0 {
            net_amount * (vat_rate / 100.0)
        } else {
            0.0
        }
    } else {
        let net_excl_vat = net_amount / (1.0 + vat_rate / 100.0);
        let vat = net_amount - net_excl_vat;
        net_amount = net_excl_vat;
        vat
    };
    let total = net_amount + vat_amount;

    json!({
        "net_amount": round2(net_amount),
        "vat_amount": round2(vat_amount),
        "total": round2(total),
    })
}

/// Insert a computed `totals` mapping into the record unless the caller
/// already provided one. VAT parameters come from the record's optional
/// `tax` mapping (`vat_rate`, `apply_to_net`).
pub fn ensure_totals(record: &mut Value) {
    let Value::Object(map) = record else {
        return;
    };
    if map.contains_key("totals") {
        return;
    }
    let line_items = match map.get("line_items") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let tax = map.get("tax");
    let vat_rate = tax
        .and_then(|t| t.get("vat_rate"))
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_VAT_RATE);
    let apply_to_net = tax
        .and_then(|t| t.get("apply_to_net"))
        .and_then(Value::as_bool)
        .unwrap_or(true);

    map.insert(
        "totals".to_string(),
        calculate_totals(&line_items, vat_rate, apply_to_net),
    );
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
