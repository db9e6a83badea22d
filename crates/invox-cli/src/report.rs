//! Markdown reports for extracted invoices and batch runs.

use chrono::Local;

use invox_core::models::invoice::InvoiceRecord;

/// Outcome of processing one file in a batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    pub file: String,
    pub record: Option<InvoiceRecord>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn field_line(label: &str, value: Option<&str>) -> String {
    format!("- **{}:** {}\n", label, value.unwrap_or("not detected"))
}

/// Render a single invoice record as a markdown report.
pub fn invoice_report(name: &str, record: &InvoiceRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Invoice Report: {name}\n\n"));
    out.push_str(&format!("Generated: {}\n\n", timestamp()));

    out.push_str("## Fields\n\n");
    out.push_str(&field_line(
        "Invoice Number",
        record.invoice_number.as_deref(),
    ));
    out.push_str(&field_line("Invoice Date", record.invoice_date.as_deref()));
    out.push_str(&field_line(
        "Invoice Total",
        record.invoice_total.as_ref().map(|a| a.formatted.as_str()),
    ));
    out.push_str(&field_line(
        "Payment Terms",
        record.payment_terms.as_deref(),
    ));
    out.push('\n');

    out.push_str("## Line Items\n\n");
    if record.line_items.is_empty() {
        out.push_str("No line items detected.\n");
    } else {
        out.push_str("| Quantity | Description | Unit Price | Amount |\n");
        out.push_str("|---|---|---|---|\n");
        for item in &record.line_items {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                item.quantity,
                item.description,
                item.unit_price
                    .as_ref()
                    .map(|a| a.formatted.as_str())
                    .unwrap_or("-"),
                item.amount.formatted,
            ));
        }
    }

    out
}

/// Render the batch run summary, one row per processed file.
pub fn batch_summary(outcomes: &[BatchOutcome]) -> String {
    let succeeded = outcomes.iter().filter(|o| o.record.is_some()).count();
    let failed = outcomes.len() - succeeded;

    let mut out = String::new();
    out.push_str("# Batch Summary\n\n");
    out.push_str(&format!("Generated: {}\n\n", timestamp()));
    out.push_str(&format!(
        "Processed {} file(s): {} succeeded, {} failed.\n\n",
        outcomes.len(),
        succeeded,
        failed
    ));

    out.push_str("| File | Status | Invoice Number | Total | Time (ms) | Error |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for outcome in outcomes {
        match &outcome.record {
            Some(record) => {
                out.push_str(&format!(
                    "| {} | ok | {} | {} | {} | |\n",
                    outcome.file,
                    record.invoice_number.as_deref().unwrap_or("-"),
                    record
                        .invoice_total
                        .as_ref()
                        .map(|a| a.formatted.as_str())
                        .unwrap_or("-"),
                    outcome.elapsed_ms,
                ));
            }
            None => {
                out.push_str(&format!(
                    "| {} | failed | - | - | {} | {} |\n",
                    outcome.file,
                    outcome.elapsed_ms,
                    outcome.error.as_deref().unwrap_or("unknown error"),
                ));
            }
        }
    }

    out
}
