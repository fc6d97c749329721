//! Sample markup templates for testing and demonstration.
//!
//! Each template exercises different supported elements and bindings,
//! paired with [`sample_record`] so it renders out of the box.

use serde_json::{json, Value};

/// Full invoice template: header, sender/recipient blocks, a repeated
/// line-item table and the totals section.
pub fn invoice_template() -> &'static str {
    r##"
<document>
    <section spacing="12">
        <text font-size="18" font-weight="bold">INVOICE</text>
        <text data-field="invoice.number" data-label="Invoice no: "/>
        <text data-field="invoice.issue_date" data-label="Issue date: "/>
        <line/>
    </section>

    <section spacing="12">
        <text font-weight="bold">From:</text>
        <text data-field="sender.name"/>
        <text data-field="sender.address"/>
        <text data-field="sender.vat_number" data-label="VAT: "/>
    </section>

    <section spacing="12">
        <text font-weight="bold">Bill to:</text>
        <text data-field="bill_to.name"/>
        <text data-field="bill_to.address"/>
        <text data-field="bill_to.vat_number" data-label="VAT: "/>
    </section>

    <table>
        <row header="true">
            <cell width="55%">Description</cell>
            <cell align="right">Qty</cell>
            <cell align="right">Amount</cell>
        </row>
        <row data-field="line_items">
            <cell data-field="description"/>
            <cell data-field="quantity" align="right"/>
            <cell data-field="amount" data-format="number" align="right"/>
        </row>
    </table>

    <section spacing="6">
        <text data-field="totals.net_amount" data-format="number" data-label="Net: " align="right"/>
        <text data-field="totals.vat_amount" data-format="number" data-label="VAT: " align="right"/>
        <text data-field="totals.total" data-format="currency" data-label="Balance due: " align="right" font-weight="bold"/>
    </section>
</document>
"##
}

/// Minimal template: one section, one bound field.
pub fn minimal_template() -> &'static str {
    r#"<document><section><text data-field="invoice.number"/></section></document>"#
}

/// A data record matching [`invoice_template`]. Totals are left out so the
/// pipeline computes them.
pub fn sample_record() -> Value {
    json!({
        "invoice": {
            "number": "FV-2026-001",
            "issue_date": "2026-01-15",
        },
        "sender": {
            "name": "Acme Studio",
            "address": "123 Business St, Warsaw",
            "vat_number": "PL5260001246",
        },
        "bill_to": {
            "name": "Client Inc",
            "address": "456 Client Ave, Krakow",
            "vat_number": "PL6772334455",
        },
        "line_items": [
            { "description": "Web development", "quantity": 40, "amount": 6000.0 },
            { "description": "Design services", "quantity": 20, "amount": 2500.0 },
            { "description": "Hosting (annual)", "quantity": 1, "amount": 500.0 },
        ],
        "tax": { "vat_rate": 23.0, "apply_to_net": true },
    })
}
