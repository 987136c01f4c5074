//! # Error Types
//!
//! Parse errors for the loosely-typed string fields carried by operations.

use thiserror::Error;

/// Errors raised while interpreting entity fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A timestamp that is not RFC 3339.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A block reference that is neither a height nor a hash.
    #[error("Invalid block id: {0}")]
    InvalidBlockId(String),
}
