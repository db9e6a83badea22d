//! Error types for the invox-core library.
//!
//! Extraction itself never fails: every detector recovers to an absent field.
//! The only fallible surface is decoding a previously saved block set.

use thiserror::Error;

/// Main error type for the invox-core library.
#[derive(Error, Debug)]
pub enum InvoxError {
    /// A saved block set could not be decoded.
    #[error("invalid block data: {0}")]
    BlockData(#[from] serde_json::Error),
}

/// Result type for the invox-core library.
pub type Result<T> = std::result::Result<T, InvoxError>;
