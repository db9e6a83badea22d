//! Top-level assembly of an [`InvoiceRecord`] from a block set.

use tracing::info;

use super::{fields, table, total};
use crate::models::block::Document;
use crate::models::invoice::InvoiceRecord;

/// Runs every detector over a document and assembles the normalized record.
///
/// The assembler is pure and deterministic: the same block set always
/// produces the same record, regardless of input block order. Missing
/// fields stay `None`; an empty document yields an empty record.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceAssembler;

impl InvoiceAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Extract a normalized invoice record from the document's blocks.
    pub fn assemble(&self, doc: &Document) -> InvoiceRecord {
        if doc.is_empty() {
            return InvoiceRecord::default();
        }

        let record = InvoiceRecord {
            invoice_number: fields::detect_invoice_number(doc),
            invoice_date: fields::detect_invoice_date(doc),
            line_items: table::reconstruct_line_items(&doc.tables()),
            invoice_total: total::resolve_total(doc),
            payment_terms: fields::detect_payment_terms(doc),
        };

        info!(
            number = record.invoice_number.as_deref().unwrap_or("-"),
            items = record.line_items.len(),
            has_total = record.invoice_total.is_some(),
            "assembled invoice record"
        );
        record
    }
}
