//! Normalise the model's loosely-typed extraction into the fixed invoice record.
//!
//! The extraction reply is whatever JSON object the model chose to produce:
//! keys may be missing, numbers may arrive as strings or the other way round,
//! and optional values may be `null`. [`map_extraction`] turns that into an
//! [`InvoiceRecord`] in which every field exists and carries a concrete value,
//! so downstream CSV columns never shift.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw field map returned by the extraction call.
pub type ExtractionResult = Map<String, Value>;

/// Currency assumed for every invoice and line item.
pub const DEFAULT_CURRENCY: &str = "TWD";

/// A value that is numeric by default but becomes text once the model fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Number(0.0)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => f.write_str(&format_float(*n)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of `remittance_invoice_no`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub amount: String,
    pub currency: String,
    pub po_line: String,
    pub po_no: String,
    pub product_name: String,
    pub quantity: String,
    pub remark: String,
    pub sn: String,
    pub tax_amount: String,
    pub tax_rate: String,
    pub unit_price: String,
}

/// The normalised invoice record. Field order is the report's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub company_code: String,
    pub doc_currency: String,
    pub doc_exchange_rate: f64,
    pub doc_net_amount: f64,
    pub doc_tax_amount: f64,
    pub doc_total_amount: Scalar,
    pub invoice_amount: String,
    pub invoice_buyer_name: String,
    pub invoice_buyer_tax_id: String,
    pub invoice_category: String,
    pub invoice_currency: String,
    pub invoice_no: String,
    pub invoice_tax_amount: String,
    pub invoice_tax_rate: String,
    pub invoice_type: String,
    pub invoice_vendor_name: String,
    pub invoice_vendor_tax_id: String,
    pub office_id: String,
    pub remittance_invoice_date: String,
    pub remittance_invoice_no: Vec<LineItem>,
}

/// `{"data": record}` wrapper used for JSON output.
#[derive(Debug, Serialize)]
pub struct RecordEnvelope<'a> {
    pub data: &'a InvoiceRecord,
}

impl Default for InvoiceRecord {
    fn default() -> Self {
        Self {
            company_code: String::new(),
            doc_currency: String::new(),
            doc_exchange_rate: 0.0,
            doc_net_amount: 0.0,
            doc_tax_amount: 0.0,
            doc_total_amount: Scalar::default(),
            invoice_amount: String::new(),
            invoice_buyer_name: String::new(),
            invoice_buyer_tax_id: String::new(),
            invoice_category: String::new(),
            invoice_currency: DEFAULT_CURRENCY.to_string(),
            invoice_no: String::new(),
            invoice_tax_amount: String::new(),
            invoice_tax_rate: String::new(),
            invoice_type: String::new(),
            invoice_vendor_name: String::new(),
            invoice_vendor_tax_id: String::new(),
            office_id: String::new(),
            remittance_invoice_date: String::new(),
            remittance_invoice_no: Vec::new(),
        }
    }
}

impl InvoiceRecord {
    /// Field names in declaration order.
    pub const FIELD_NAMES: [&'static str; 20] = [
        "company_code",
        "doc_currency",
        "doc_exchange_rate",
        "doc_net_amount",
        "doc_tax_amount",
        "doc_total_amount",
        "invoice_amount",
        "invoice_buyer_name",
        "invoice_buyer_tax_id",
        "invoice_category",
        "invoice_currency",
        "invoice_no",
        "invoice_tax_amount",
        "invoice_tax_rate",
        "invoice_type",
        "invoice_vendor_name",
        "invoice_vendor_tax_id",
        "office_id",
        "remittance_invoice_date",
        "remittance_invoice_no",
    ];

    /// Every field rendered as text, in [`FIELD_NAMES`](Self::FIELD_NAMES) order.
    ///
    /// Floats keep a decimal point (`0.0`); line items become compact JSON.
    pub fn cells(&self) -> Result<Vec<String>, serde_json::Error> {
        Ok(vec![
            self.company_code.clone(),
            self.doc_currency.clone(),
            format_float(self.doc_exchange_rate),
            format_float(self.doc_net_amount),
            format_float(self.doc_tax_amount),
            self.doc_total_amount.to_string(),
            self.invoice_amount.clone(),
            self.invoice_buyer_name.clone(),
            self.invoice_buyer_tax_id.clone(),
            self.invoice_category.clone(),
            self.invoice_currency.clone(),
            self.invoice_no.clone(),
            self.invoice_tax_amount.clone(),
            self.invoice_tax_rate.clone(),
            self.invoice_type.clone(),
            self.invoice_vendor_name.clone(),
            self.invoice_vendor_tax_id.clone(),
            self.office_id.clone(),
            self.remittance_invoice_date.clone(),
            serde_json::to_string(&self.remittance_invoice_no)?,
        ])
    }

    pub fn envelope(&self) -> RecordEnvelope<'_> {
        RecordEnvelope { data: self }
    }
}

/// Map a raw extraction onto the fixed template.
///
/// Pure: the same `(raw, category)` always yields the same record.
pub fn map_extraction(raw: &ExtractionResult, category: &str) -> InvoiceRecord {
    let mut record = InvoiceRecord {
        invoice_type: category.to_string(),
        ..InvoiceRecord::default()
    };

    if let Some(v) = raw.get("doc_total_amount") {
        record.doc_total_amount = Scalar::Text(stringify(v));
    }
    if let Some(v) = raw.get("invoice_amount") {
        record.invoice_amount = stringify(v);
    }

    record.invoice_vendor_name = text_field(raw, "invoice_vendor_name");
    record.invoice_vendor_tax_id = text_field(raw, "invoice_vendor_tax_id");
    record.invoice_buyer_name = text_field(raw, "invoice_buyer_name");
    record.invoice_buyer_tax_id = text_field(raw, "invoice_buyer_tax_id");
    record.remittance_invoice_date = text_field(raw, "remittance_invoice_date");

    if let Some(items) = raw.get("remittance_invoice_no").and_then(Value::as_array) {
        record.remittance_invoice_no = items
            .iter()
            .enumerate()
            .map(|(idx, item)| line_item(idx + 1, item))
            .collect();
    }

    record
}

fn line_item(sn: usize, item: &Value) -> LineItem {
    let amount = item.get("amount").map(stringify).unwrap_or_default();
    LineItem {
        unit_price: amount.clone(),
        amount,
        currency: DEFAULT_CURRENCY.to_string(),
        po_line: String::new(),
        po_no: String::new(),
        product_name: item.get("product_name").map(stringify).unwrap_or_default(),
        // Model-supplied quantities are ignored.
        quantity: "1".to_string(),
        remark: String::new(),
        sn: sn.to_string(),
        tax_amount: String::new(),
        tax_rate: String::new(),
    }
}

fn text_field(raw: &ExtractionResult, key: &str) -> String {
    raw.get(key).map(stringify).unwrap_or_default()
}

/// String form of a JSON value: strings unquoted, numbers as written, null empty.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn format_float(n: f64) -> String {
    format!("{n:?}")
}
