//! Line-item reconstruction from table grids.
//!
//! Finds the header row, maps columns to semantic roles, then walks data
//! rows: a row with a numeric amount or quantity starts a new item, a
//! description-only row continues the previous item's description, and
//! summary rows (subtotal, tax, total) are skipped entirely.

use rust_decimal::Decimal;
use tracing::debug;

use super::amount::{parse_amount, parse_number};
use super::patterns::SUMMARY_INDICATORS;
use crate::models::block::{GridCell, TableGrid};
use crate::models::invoice::LineItem;

/// Semantic role of a line-item table column, detected from its header cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Description,
    Quantity,
    UnitPrice,
    Amount,
}

impl ColumnRole {
    /// Map a header cell to a role. Synonym sets are disjoint per role and
    /// checked in three passes (exact, whole-word, substring) so "Amount"
    /// can never land on the quantity column.
    pub fn detect(header: &str) -> Option<ColumnRole> {
        let normalized = header.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        const DESCRIPTION: &[&str] = &["description", "item", "service", "product", "details", "particulars"];
        const QUANTITY: &[&str] = &["quantity", "qty", "hours", "units", "count"];
        const UNIT_PRICE: &[&str] = &["unit price", "unit cost", "rate", "price each", "price/unit", "price"];
        const AMOUNT: &[&str] = &["amount", "total", "line total", "subtotal", "cost", "sum", "value"];

        let tables: [(ColumnRole, &[&str]); 4] = [
            (ColumnRole::Description, DESCRIPTION),
            (ColumnRole::Quantity, QUANTITY),
            (ColumnRole::UnitPrice, UNIT_PRICE),
            (ColumnRole::Amount, AMOUNT),
        ];

        for (role, synonyms) in tables {
            if synonyms.iter().any(|s| *s == normalized) {
                return Some(role);
            }
        }
        for (role, synonyms) in tables {
            if synonyms
                .iter()
                .any(|s| normalized.split_whitespace().any(|word| word == *s))
            {
                return Some(role);
            }
        }
        for (role, synonyms) in tables {
            if synonyms.iter().any(|s| normalized.contains(s)) {
                return Some(role);
            }
        }
        None
    }
}

/// Column-index-to-role mapping for one table.
#[derive(Debug, Clone)]
struct ColumnMap {
    roles: Vec<Option<ColumnRole>>,
    header_row: usize,
}

impl ColumnMap {
    /// Locate the header among the first rows of the grid. A header row must
    /// resolve at least two roles including both a description and an amount
    /// column; without that the table is not a line-item table.
    fn detect(grid: &TableGrid) -> Option<ColumnMap> {
        for (index, row) in grid.rows().iter().take(4).enumerate() {
            let roles: Vec<Option<ColumnRole>> = row
                .iter()
                .map(|cell| ColumnRole::detect(&cell.text))
                .collect();

            let resolved = roles.iter().flatten().count();
            let has_description = roles.contains(&Some(ColumnRole::Description));
            let has_amount = roles.contains(&Some(ColumnRole::Amount));
            if resolved >= 2 && has_description && has_amount {
                return Some(ColumnMap {
                    roles,
                    header_row: index,
                });
            }
        }
        None
    }

    /// First cell of the row carrying the given role, if any.
    fn cell<'a>(&self, row: &'a [GridCell], role: ColumnRole) -> Option<&'a GridCell> {
        self.roles
            .iter()
            .zip(row)
            .find(|(r, _)| **r == Some(role))
            .map(|(_, cell)| cell)
    }
}

fn is_summary_row(row_text: &str) -> bool {
    let lowered = row_text.to_lowercase();
    SUMMARY_INDICATORS.iter().any(|kw| lowered.contains(kw))
}

/// A line item mid-assembly; finalized only once both an amount and a
/// non-empty description are present.
#[derive(Debug, Default)]
struct PendingItem {
    quantity: Option<Decimal>,
    description: String,
    unit_price: Option<crate::models::invoice::Amount>,
    amount: Option<crate::models::invoice::Amount>,
}

impl PendingItem {
    fn finalize(self) -> Option<LineItem> {
        let amount = self.amount?;
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return None;
        }
        Some(LineItem {
            quantity: self.quantity.unwrap_or(Decimal::ONE),
            description,
            unit_price: self.unit_price,
            amount,
        })
    }

    fn append_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.description.is_empty() {
            self.description.push_str(text);
        } else {
            self.description.push(' ');
            self.description.push_str(text);
        }
    }
}

/// Reconstruct line items from every line-item table in the document, in
/// table order. Tables without a recognizable header contribute nothing.
pub fn reconstruct_line_items(grids: &[TableGrid]) -> Vec<LineItem> {
    let mut items = Vec::new();

    for grid in grids {
        let Some(map) = ColumnMap::detect(grid) else {
            debug!(table = grid.id.0, "no line-item header found, skipping table");
            continue;
        };

        let mut pending: Option<PendingItem> = None;

        for (index, row) in grid.rows().iter().enumerate().skip(map.header_row + 1) {
            if is_summary_row(&grid.row_text(index)) {
                continue;
            }

            let amount = map
                .cell(row, ColumnRole::Amount)
                .filter(|c| !c.is_empty())
                .and_then(|c| parse_amount(&c.text));
            let quantity = map
                .cell(row, ColumnRole::Quantity)
                .filter(|c| !c.is_empty())
                .and_then(|c| parse_number(&c.text));
            let description = map
                .cell(row, ColumnRole::Description)
                .map(|c| c.text.trim())
                .unwrap_or_default();

            if amount.is_some() || quantity.is_some() {
                // New item; flush the previous one.
                if let Some(done) = pending.take().and_then(PendingItem::finalize) {
                    items.push(done);
                }
                let mut item = PendingItem {
                    quantity,
                    amount,
                    unit_price: map
                        .cell(row, ColumnRole::UnitPrice)
                        .filter(|c| !c.is_empty())
                        .and_then(|c| parse_amount(&c.text)),
                    ..PendingItem::default()
                };
                item.append_description(description);
                pending = Some(item);
            } else if !description.is_empty() {
                // Wrapped description text belongs to the item above it.
                if let Some(item) = pending.as_mut() {
                    item.append_description(description);
                }
            }
        }

        if let Some(done) = pending.and_then(PendingItem::finalize) {
            items.push(done);
        }
    }

    debug!(count = items.len(), "reconstructed line items");
    items
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::block::{CellBlock, Document, Geometry, RawBlock, TableId};
    use crate::models::invoice::Currency;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn grid_from(table: u32, page: u32, rows: &[&[&str]]) -> Vec<RawBlock> {
        let mut blocks = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                blocks.push(RawBlock::Cell(CellBlock {
                    table: TableId(table),
                    row: r as u32 + 1,
                    column: c as u32 + 1,
                    text: text.to_string(),
                    geometry: Geometry {
                        page,
                        left: 0.1 * c as f32,
                        top: 0.05 * r as f32,
                        width: 0.1,
                        height: 0.02,
                    },
                    confidence: 95.0,
                }));
            }
        }
        blocks
    }

    fn items_for(rows: &[&[&str]]) -> Vec<LineItem> {
        let doc = Document::new(grid_from(1, 1, rows));
        reconstruct_line_items(&doc.tables())
    }

    #[test]
    fn header_roles_are_disjoint() {
        assert_eq!(ColumnRole::detect("Description"), Some(ColumnRole::Description));
        assert_eq!(ColumnRole::detect("Qty"), Some(ColumnRole::Quantity));
        assert_eq!(ColumnRole::detect("Unit Price"), Some(ColumnRole::UnitPrice));
        assert_eq!(ColumnRole::detect("Amount"), Some(ColumnRole::Amount));
        assert_eq!(ColumnRole::detect("AMOUNT ($)"), Some(ColumnRole::Amount));
        assert_eq!(ColumnRole::detect("Hours"), Some(ColumnRole::Quantity));
        assert_eq!(ColumnRole::detect(""), None);
        assert_eq!(ColumnRole::detect("Notes"), None);
    }

    #[test]
    fn simple_table_becomes_line_items() {
        let items = items_for(&[
            &["Qty", "Description", "Unit Price", "Amount"],
            &["1", "Web Design", "$85.00", "$85.00"],
            &["2", "Hosting", "$10.00", "$20.00"],
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Web Design");
        assert_eq!(items[0].quantity, dec("1"));
        assert_eq!(items[0].unit_price.as_ref().unwrap().value, dec("85.00"));
        assert_eq!(items[0].amount.value, dec("85.00"));
        assert_eq!(items[0].amount.currency, Some(Currency::Usd));
        assert_eq!(items[1].description, "Hosting");
        assert_eq!(items[1].amount.value, dec("20.00"));
    }

    #[test]
    fn continuation_rows_extend_the_description() {
        let items = items_for(&[
            &["Qty", "Description", "Amount"],
            &["1", "Web Design", "$85.00"],
            &["", "This is a sample description.", ""],
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].description,
            "Web Design This is a sample description."
        );
    }

    #[test]
    fn summary_rows_are_skipped() {
        let items = items_for(&[
            &["Description", "Amount"],
            &["Consulting", "$100.00"],
            &["Subtotal", "$100.00"],
            &["Tax (10%)", "$10.00"],
            &["Total", "$110.00"],
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Consulting");
    }

    #[test]
    fn quantity_defaults_to_one() {
        let items = items_for(&[
            &["Description", "Amount"],
            &["Flat fee service", "$50.00"],
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, Decimal::ONE);
        assert!(items[0].unit_price.is_none());
    }

    #[test]
    fn amountless_rows_are_dropped() {
        let items = items_for(&[
            &["Description", "Amount"],
            &["No charge note", ""],
            &["Real work", "$30.00"],
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Real work");
    }

    #[test]
    fn header_may_sit_below_a_title_row() {
        let items = items_for(&[
            &["Services rendered", "", ""],
            &["Description", "Qty", "Amount"],
            &["Support", "3", "$45.00"],
        ]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, dec("3"));
    }

    #[test]
    fn tables_without_line_item_headers_are_ignored() {
        let items = items_for(&[
            &["Bill To", "Ship To"],
            &["Acme Corp", "Acme Corp"],
        ]);
        assert!(items.is_empty());
    }

    #[test]
    fn multi_page_tables_concatenate_in_page_order() {
        let mut blocks = grid_from(
            2,
            2,
            &[
                &["Description", "Amount"],
                &["Second page work", "$5.00"],
            ],
        );
        blocks.extend(grid_from(
            1,
            1,
            &[
                &["Description", "Amount"],
                &["First page work", "$7.00"],
            ],
        ));

        let doc = Document::new(blocks);
        let items = reconstruct_line_items(&doc.tables());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "First page work");
        assert_eq!(items[1].description, "Second page work");
    }
}
