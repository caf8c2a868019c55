use thiserror::Error;

use crate::id::SchemeTag;

/// Errors produced by identifier operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// An id produced by one scheme was offered to a component of another.
    #[error("scheme mismatch: expected {expected}, got {actual}")]
    SchemeMismatch {
        expected: SchemeTag,
        actual: SchemeTag,
    },

    #[error("invalid content id format: {0}")]
    InvalidFormat(String),
}
