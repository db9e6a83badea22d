//! Data models for OCR primitives and the normalized invoice record.

pub mod block;
pub mod invoice;
