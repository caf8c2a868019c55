//! Error types for edges and the graph index.

use trellis_datum::DatumError;
use trellis_store::StoreError;
use trellis_stuff::StuffError;
use trellis_types::{ContentId, TypeError};

use crate::field::EdgeField;

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A map lacks one of the six canonical fields.
    #[error("edge is missing canonical field {0}")]
    MissingField(EdgeField),

    /// An edge member could not be resolved through the edge's own store or
    /// the index fallback.
    #[error("cannot resolve node {0}: no store holds it")]
    Unresolvable(ContentId),

    /// A pattern could not be inflated or evaluated.
    #[error("pattern error: {0}")]
    Pattern(String),

    #[error(transparent)]
    Datum(#[from] DatumError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stuff(#[from] StuffError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
