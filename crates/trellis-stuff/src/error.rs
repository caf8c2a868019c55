use trellis_datum::DatumError;
use trellis_store::StoreError;
use trellis_types::{ContentId, SchemeTag, TypeError};

/// Errors from stuffing, unstuffing, and stream framing.
#[derive(Debug, thiserror::Error)]
pub enum StuffError {
    /// A referenced payload is absent from the source store.
    #[error("closure incomplete: {0} is missing from the source")]
    Missing(ContentId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Datum(#[from] DatumError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// The stream is malformed; reading stops at the first such error.
    #[error("framing error: {0}")]
    Framing(String),

    #[error("unknown scheme tag {0}")]
    UnknownScheme(SchemeTag),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream held no items, so it has no top.
    #[error("stream holds no items")]
    Empty,
}

/// Result alias for bundle operations.
pub type StuffResult<T> = Result<T, StuffError>;
