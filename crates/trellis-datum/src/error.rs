use trellis_store::StoreError;
use trellis_types::{ContentId, TypeError};

/// Errors from collection operations.
#[derive(Debug, thiserror::Error)]
pub enum DatumError {
    /// In-place mutation of a frozen collection.
    #[error("cannot mutate a frozen {0} in place")]
    Immutable(&'static str),

    /// An id of the wrong scheme or length was offered.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Serialized bytes do not split into whole records.
    #[error("corrupt {what}: {len} bytes is not a multiple of the {record}-byte record size")]
    Corrupt {
        what: &'static str,
        len: usize,
        record: usize,
    },

    /// A referenced payload is not available.
    #[error("referenced content missing: {0}")]
    Missing(ContentId),

    /// The collection has no source store to resolve members against.
    #[error("{0} is not bound to a store")]
    Unbound(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for collection operations.
pub type DatumResult<T> = Result<T, DatumError>;
