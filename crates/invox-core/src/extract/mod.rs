//! The extraction engine: detectors, parsers, and the record assembler.

pub mod amount;
pub mod assembler;
pub mod fields;
pub mod patterns;
pub mod table;
pub mod total;

pub use amount::{parse_amount, parse_number};
pub use assembler::InvoiceAssembler;
pub use fields::{Candidate, FieldRole, SourceKind};
pub use table::{ColumnRole, reconstruct_line_items};
pub use total::resolve_total;
