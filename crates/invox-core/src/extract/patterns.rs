//! Regex patterns and keyword tables for invoice field detection.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Numeric token with optional grouping/decimal separators. The last
    // separator is decided decimal-vs-grouping by the two-digit rule in
    // `extract::amount`.
    pub static ref NUMBER_TOKEN: Regex = Regex::new(
        r"[-+]?\d+(?:[.,]\d+)*"
    ).unwrap();

    // Invoice number labeled inline: "Invoice No: INV-3337", "Bill # 42".
    pub static ref INVOICE_NUMBER_LABELED: Regex = Regex::new(
        r"(?i)\b(?:invoice|inv|bill)[\s.\-]*(?:number|num|no|nr|#)[\s.:#]*([A-Za-z0-9][A-Za-z0-9\-/]{1,})"
    ).unwrap();

    // Bare "Invoice INV-3337" / "# INV-3337" fallbacks.
    pub static ref INVOICE_NUMBER_BARE: Regex = Regex::new(
        r"(?i)\binvoice[\s:]+([A-Za-z0-9][A-Za-z0-9\-/]{2,})"
    ).unwrap();

    pub static ref HASH_NUMBER: Regex = Regex::new(
        r"#\s*([A-Za-z0-9][A-Za-z0-9\-/]{2,})"
    ).unwrap();

    // A candidate invoice-number token standing alone on its own line.
    pub static ref STANDALONE_TOKEN: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9\-/]{2,}$"
    ).unwrap();

    pub static ref HAS_DIGIT: Regex = Regex::new(r"\d").unwrap();

    // Date patterns in fixed priority order (see `fields::detect_invoice_date`).
    pub static ref DATE_MONTH_FIRST: Regex = Regex::new(
        r"(?i)\b(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b"
    ).unwrap();

    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"(?i)\b\d{1,2}(?:st|nd|rd|th)?\s+(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)\.?,?\s+\d{4}\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b\d{4}-\d{1,2}-\d{1,2}\b"
    ).unwrap();

    pub static ref DATE_SLASH: Regex = Regex::new(
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b"
    ).unwrap();

    pub static ref DATE_DOTTED: Regex = Regex::new(
        r"\b\d{1,2}\.\d{1,2}\.\d{2,4}\b"
    ).unwrap();
}

/// Date patterns tried in order; the first that matches anywhere wins.
pub fn date_patterns() -> [&'static Regex; 5] {
    [
        &DATE_MONTH_FIRST,
        &DATE_DAY_FIRST,
        &DATE_YMD,
        &DATE_SLASH,
        &DATE_DOTTED,
    ]
}

/// Key-text keywords identifying an invoice number form field.
pub const INVOICE_NUMBER_KEYS: &[&str] = &[
    "invoice number",
    "invoice no",
    "invoice num",
    "invoice #",
    "inv number",
    "inv no",
    "bill number",
    "bill no",
];

/// Key-text keywords identifying an invoice date form field. Keys
/// mentioning "due" are excluded unless they also mention "invoice".
pub const DATE_KEYS: &[&str] = &[
    "invoice date",
    "date of issue",
    "issue date",
    "bill date",
    "issued",
    "date",
];

/// Keywords identifying payment-terms text.
pub const PAYMENT_TERMS_KEYS: &[&str] = &[
    "payment terms",
    "terms of payment",
    "payment is due",
    "payable within",
    "due within",
    "due upon",
    "late fee",
    "net 15",
    "net 30",
    "net 45",
    "net 60",
];

/// Row text markers for summary rows inside line-item tables. Such rows
/// feed the total resolver, never the line items.
pub const SUMMARY_INDICATORS: &[&str] = &[
    "subtotal",
    "sub total",
    "sub-total",
    "total",
    "balance due",
    "amount due",
    "total due",
    "tax",
    "vat",
    "discount",
    "net amount",
    "gross amount",
    "amount payable",
];
