//! Instruction templates for the two vision-model calls.
//!
//! Both prompts live here so that a wording change touches exactly one place
//! and tests can inspect them without a live model.

/// The five invoice categories the classifier chooses from, in prompt order.
pub const CATEGORY_LABELS: [&str; 5] = [
    "三聯式發票 (Three-part Invoice)",
    "二聯式發票 (Two-part Invoice)",
    "電子發票 (E-Invoice)",
    "收據 (Receipt)",
    "收銀機統一發票 (Cash Register Receipt)",
];

/// Field names the extraction prompt asks the model to return.
pub const EXTRACTION_FIELDS: [&str; 8] = [
    "invoice_vendor_name",
    "invoice_vendor_tax_id",
    "invoice_buyer_name",
    "invoice_buyer_tax_id",
    "invoice_amount",
    "remittance_invoice_date",
    "remittance_invoice_no",
    "doc_total_amount",
];

/// Classification instruction. The reply is trimmed and used verbatim as the
/// record's `invoice_type`.
pub const CLASSIFY_PROMPT: &str = r#"Please analyze this image and identify the exact type of invoice/receipt.
Choose from the following categories:
1. 三聯式發票 (Three-part Invoice)
2. 二聯式發票 (Two-part Invoice)
3. 電子發票 (E-Invoice)
4. 收據 (Receipt)
5. 收銀機統一發票 (Cash Register Receipt)

Please provide only the category number and name, no additional explanation."#;

/// Extraction instruction. The reply is expected to be a single JSON object.
pub const EXTRACT_PROMPT: &str = r#"Please analyze this invoice image and extract the following information in JSON format:
- invoice_vendor_name (seller's name)
- invoice_vendor_tax_id (seller's tax ID)
- invoice_buyer_name (buyer's name)
- invoice_buyer_tax_id (buyer's tax ID)
- invoice_amount (total amount)
- remittance_invoice_date (date)
- remittance_invoice_no (array of items with amount, product_name)
- doc_total_amount (total amount)

Please ensure the amounts are numbers without currency symbols and provide dates in YYYY-MM-DD format."#;
