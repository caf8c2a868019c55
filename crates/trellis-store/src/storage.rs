use bytes::Bytes;
use trellis_types::ContentId;

use crate::error::{StoreError, StoreResult};

/// A key-value backend keyed by content id.
///
/// Backends never hash: the [`Repo`](crate::Repo) computes ids and hands them
/// down. All implementations must satisfy these invariants:
/// - Writing an id that is already present is a no-op.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait Storage: Send + Sync {
    /// Read the payload stored under `id`. `Ok(None)` if absent.
    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>>;

    /// Store `data` under `id`.
    fn put(&self, id: &ContentId, data: Bytes) -> StoreResult<()>;

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool>;

    /// Whether [`remove`](Storage::remove) is available.
    fn supports_deletion(&self) -> bool {
        false
    }

    /// Delete `id`. Returns `true` if it was present.
    fn remove(&self, _id: &ContentId) -> StoreResult<bool> {
        Err(StoreError::DeletionUnsupported)
    }

    /// Short label for logs.
    fn describe(&self) -> String {
        "storage".to_string()
    }
}
