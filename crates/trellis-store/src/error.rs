use trellis_types::{ContentId, TypeError};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Content that had to be present was not found.
    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// The backend cannot delete content.
    #[error("deletion is not supported by this store")]
    DeletionUnsupported,

    /// The store does not accept writes.
    #[error("store is read-only")]
    ReadOnly,

    /// An id was malformed or belonged to another scheme.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Bytes returned by a backend do not hash to the requested id.
    #[error("hash mismatch for {id}: backend returned content hashing to {computed}")]
    HashMismatch { id: ContentId, computed: ContentId },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
