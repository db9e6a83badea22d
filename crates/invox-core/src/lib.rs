//! Core library for invoice reconstruction from OCR output.
//!
//! This crate provides:
//! - Typed models for OCR primitives (lines, key-value pairs, tables, cells)
//! - Currency-aware numeric parsing
//! - Field candidate detection (invoice number, date, payment terms)
//! - Line-item table reconstruction with wrapped-description merging
//! - Total resolution and final record assembly
//!
//! The engine is pure and synchronous: one [`Document`] in, one
//! [`InvoiceRecord`] out, no I/O and no shared state. A malformed document
//! degrades to absent fields, never to an error.

pub mod error;
pub mod extract;
pub mod models;

pub use error::{InvoxError, Result};
pub use extract::{InvoiceAssembler, parse_amount, parse_number};
pub use models::block::{
    CellBlock, Document, Geometry, KeyValuePair, QueryAnswer, RawBlock, SignatureBlock, TableBlock,
    TableGrid, TableId, TextLine, TextWord,
};
pub use models::invoice::{Amount, Currency, InvoiceRecord, LineItem};
