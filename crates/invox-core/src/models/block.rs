//! Typed OCR primitives and the per-document block set.
//!
//! A [`Document`] is the immutable input to the extraction engine: an
//! unordered bag of [`RawBlock`]s as delivered by the analysis service,
//! with read-only views that impose page/reading order and reconstruct
//! table grids from loose cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier linking a cell back to the table it belongs to.
///
/// Cells do not own their table and tables do not own their cells; grids
/// are resolved by grouping cells on this id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TableId(pub u32);

/// Normalized position of a block on its page.
///
/// Coordinates are fractions of the page size, origin at the top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// 1-based page index.
    pub page: u32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Geometry {
    /// Lowest point of the block on its page (larger = further down).
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// One OCR-detected structural unit with geometry and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawBlock {
    /// A full line of detected text.
    Line(TextLine),
    /// A single detected word.
    Word(TextWord),
    /// A resolved form field (key text paired with value text).
    KeyValue(KeyValuePair),
    /// A detected table. Carries no cells; see [`TableId`].
    Table(TableBlock),
    /// A single table cell with its grid position.
    Cell(CellBlock),
    /// A detected signature region (no text content).
    Signature(SignatureBlock),
    /// An answered analysis query.
    Query(QueryAnswer),
}

impl RawBlock {
    /// Geometry of the block, whatever its kind.
    pub fn geometry(&self) -> &Geometry {
        match self {
            RawBlock::Line(b) => &b.geometry,
            RawBlock::Word(b) => &b.geometry,
            RawBlock::KeyValue(b) => &b.geometry,
            RawBlock::Table(b) => &b.geometry,
            RawBlock::Cell(b) => &b.geometry,
            RawBlock::Signature(b) => &b.geometry,
            RawBlock::Query(b) => &b.geometry,
        }
    }

    /// Detection confidence (0-100), whatever the kind.
    pub fn confidence(&self) -> f32 {
        match self {
            RawBlock::Line(b) => b.confidence,
            RawBlock::Word(b) => b.confidence,
            RawBlock::KeyValue(b) => b.confidence,
            RawBlock::Table(b) => b.confidence,
            RawBlock::Cell(b) => b.confidence,
            RawBlock::Signature(b) => b.confidence,
            RawBlock::Query(b) => b.confidence,
        }
    }
}

/// A full line of detected text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub geometry: Geometry,
    /// Detection confidence (0-100).
    pub confidence: f32,
}

/// A single detected word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextWord {
    pub text: String,
    pub geometry: Geometry,
    pub confidence: f32,
}

/// A resolved form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    /// Geometry of the key region.
    pub geometry: Geometry,
    pub confidence: f32,
}

/// A detected table region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBlock {
    pub id: TableId,
    pub geometry: Geometry,
    pub confidence: f32,
}

/// A single table cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellBlock {
    /// Non-owning back-reference to the containing table.
    pub table: TableId,
    /// 1-based row index within the table.
    pub row: u32,
    /// 1-based column index within the table.
    pub column: u32,
    pub text: String,
    pub geometry: Geometry,
    pub confidence: f32,
}

/// A detected signature region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub geometry: Geometry,
    pub confidence: f32,
}

/// An answered custom query submitted with the analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Question text as submitted.
    pub question: String,
    /// Short identifier configured with the question; may be empty.
    pub alias: String,
    /// Detected answer text; empty when the service found none.
    pub answer: String,
    /// Geometry of the answer region.
    pub geometry: Geometry,
    /// Confidence of the answer (0-100).
    pub confidence: f32,
}

/// One cell in a reconstructed table grid. Gaps in the source grid are
/// filled with empty cells so every row has the same width.
#[derive(Debug, Clone, Default)]
pub struct GridCell {
    pub text: String,
    pub geometry: Geometry,
    pub confidence: f32,
}

impl GridCell {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A dense table reconstructed from loose cell blocks.
#[derive(Debug, Clone)]
pub struct TableGrid {
    pub id: TableId,
    /// Page the table was detected on.
    pub page: u32,
    pub confidence: f32,
    rows: Vec<Vec<GridCell>>,
}

impl TableGrid {
    /// Rows in top-to-bottom order, each a full-width vector of cells.
    pub fn rows(&self) -> &[Vec<GridCell>] {
        &self.rows
    }

    /// All cell text of one row, space-joined.
    pub fn row_text(&self, index: usize) -> String {
        self.rows
            .get(index)
            .map(|row| {
                row.iter()
                    .map(|c| c.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

/// The immutable block set for one processed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    blocks: Vec<RawBlock>,
}

impl Document {
    pub fn new(blocks: Vec<RawBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[RawBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text lines in reading order: page, then top, then left.
    pub fn lines(&self) -> Vec<&TextLine> {
        let mut lines: Vec<&TextLine> = self
            .blocks
            .iter()
            .filter_map(|b| match b {
                RawBlock::Line(line) => Some(line),
                _ => None,
            })
            .collect();
        lines.sort_by(|a, b| {
            a.geometry
                .page
                .cmp(&b.geometry.page)
                .then(a.geometry.top.total_cmp(&b.geometry.top))
                .then(a.geometry.left.total_cmp(&b.geometry.left))
        });
        lines
    }

    /// All resolved form fields, in block order.
    pub fn key_values(&self) -> Vec<&KeyValuePair> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                RawBlock::KeyValue(kv) => Some(kv),
                _ => None,
            })
            .collect()
    }

    /// All answered queries, in block order.
    pub fn queries(&self) -> Vec<&QueryAnswer> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                RawBlock::Query(q) => Some(q),
                _ => None,
            })
            .collect()
    }

    /// All detected signature regions, in block order.
    pub fn signatures(&self) -> Vec<&SignatureBlock> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                RawBlock::Signature(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Reconstruct dense grids from table and cell blocks, ordered by page
    /// then table id. Tables referenced only by cells (no table block) are
    /// still materialized.
    pub fn tables(&self) -> Vec<TableGrid> {
        let mut meta: BTreeMap<TableId, (u32, f32)> = BTreeMap::new();
        let mut cells: BTreeMap<TableId, Vec<&CellBlock>> = BTreeMap::new();

        for block in &self.blocks {
            match block {
                RawBlock::Table(t) => {
                    meta.insert(t.id, (t.geometry.page, t.confidence));
                }
                RawBlock::Cell(c) => {
                    // Grid indices are 1-based; a zero index is malformed
                    // input and must not poison the rest of the table.
                    if c.row == 0 || c.column == 0 {
                        continue;
                    }
                    cells.entry(c.table).or_default().push(c);
                }
                _ => {}
            }
        }

        let mut grids = Vec::with_capacity(cells.len());
        for (id, table_cells) in cells {
            let (page, confidence) = meta.get(&id).copied().unwrap_or_else(|| {
                (table_cells[0].geometry.page, table_cells[0].confidence)
            });

            let max_row = table_cells.iter().map(|c| c.row).max().unwrap_or(0) as usize;
            let max_col = table_cells.iter().map(|c| c.column).max().unwrap_or(0) as usize;
            if max_row == 0 || max_col == 0 {
                continue;
            }

            let mut rows = vec![vec![GridCell::default(); max_col]; max_row];
            for cell in table_cells {
                rows[cell.row as usize - 1][cell.column as usize - 1] = GridCell {
                    text: cell.text.clone(),
                    geometry: cell.geometry,
                    confidence: cell.confidence,
                };
            }

            grids.push(TableGrid {
                id,
                page,
                confidence,
                rows,
            });
        }

        grids.sort_by_key(|g| (g.page, g.id));
        grids
    }

    /// All line text concatenated in reading order.
    pub fn full_text(&self) -> String {
        self.lines()
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Decode a block set previously saved with [`Document::to_json`].
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Serialize the block set for later offline extraction.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(text: &str, page: u32, top: f32) -> RawBlock {
        RawBlock::Line(TextLine {
            text: text.to_string(),
            geometry: Geometry {
                page,
                left: 0.1,
                top,
                width: 0.5,
                height: 0.02,
            },
            confidence: 99.0,
        })
    }

    fn cell(table: u32, row: u32, column: u32, text: &str, page: u32) -> RawBlock {
        RawBlock::Cell(CellBlock {
            table: TableId(table),
            row,
            column,
            text: text.to_string(),
            geometry: Geometry {
                page,
                left: 0.1 * column as f32,
                top: 0.1 * row as f32,
                width: 0.1,
                height: 0.02,
            },
            confidence: 95.0,
        })
    }

    #[test]
    fn lines_are_sorted_by_page_then_position() {
        let doc = Document::new(vec![
            line("second", 1, 0.5),
            line("third", 2, 0.1),
            line("first", 1, 0.1),
        ]);

        let texts: Vec<&str> = doc.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn cells_group_into_grids_by_table_id() {
        let doc = Document::new(vec![
            cell(2, 1, 1, "page two", 2),
            cell(1, 1, 1, "a", 1),
            cell(1, 1, 2, "b", 1),
            cell(1, 2, 2, "d", 1),
        ]);

        let grids = doc.tables();
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].page, 1);
        assert_eq!(grids[0].rows().len(), 2);
        assert_eq!(grids[0].rows()[0][1].text, "b");
        // Missing (2,1) is filled with an empty cell.
        assert!(grids[0].rows()[1][0].is_empty());
        assert_eq!(grids[1].page, 2);
    }

    #[test]
    fn zero_indexed_cells_are_skipped() {
        let doc = Document::new(vec![
            cell(1, 0, 1, "ghost row", 1),
            cell(1, 1, 0, "ghost column", 1),
            cell(1, 2, 1, "real", 1),
        ]);

        let grids = doc.tables();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].rows().len(), 2);
        assert!(grids[0].rows()[0][0].is_empty());
        assert_eq!(grids[0].rows()[1][0].text, "real");
    }

    #[test]
    fn tables_with_only_malformed_cells_vanish() {
        let doc = Document::new(vec![cell(1, 0, 0, "ghost", 1)]);
        assert!(doc.tables().is_empty());
    }

    #[test]
    fn grid_row_text_joins_non_empty_cells() {
        let doc = Document::new(vec![
            cell(1, 1, 1, "Subtotal", 1),
            cell(1, 1, 2, "", 1),
            cell(1, 1, 3, "$90.00", 1),
        ]);

        let grids = doc.tables();
        assert_eq!(grids[0].row_text(0), "Subtotal $90.00");
    }

    #[test]
    fn block_set_round_trips_through_json() {
        let doc = Document::new(vec![
            line("Invoice", 1, 0.1),
            cell(1, 1, 1, "Amount", 1),
            RawBlock::KeyValue(KeyValuePair {
                key: "Date:".to_string(),
                value: "2024-01-15".to_string(),
                geometry: Geometry::default(),
                confidence: 90.0,
            }),
        ]);

        let json = doc.to_json().unwrap();
        let back = Document::from_json(&json).unwrap();
        assert_eq!(back.blocks().len(), 3);
        assert_eq!(back.key_values()[0].value, "2024-01-15");
    }
}
