use bytes::Bytes;
use trellis_crypto::SchemeRef;
use trellis_types::ContentId;

use crate::cache::ContentCache;
use crate::error::{StoreError, StoreResult};

/// A content-addressed store bound to one digest scheme.
///
/// All implementations must satisfy these invariants:
/// - For every id returned by [`put`](Repo::put), `scheme().key_for(data) == id`.
/// - `put` of identical bytes is idempotent.
/// - [`get`](Repo::get) reports absence as `Ok(None)`; only
///   [`fetch`](Repo::fetch) turns absence into an error.
/// - Ids of another scheme are rejected, never looked up.
pub trait Repo: Send + Sync {
    /// The scheme every id in this store belongs to.
    fn scheme(&self) -> SchemeRef;

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool>;

    /// Read the payload for `id`. `Ok(None)` if absent.
    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>>;

    /// Store `data` and return its content id.
    fn put(&self, data: &[u8]) -> StoreResult<ContentId>;

    /// Whether [`remove`](Repo::remove) is available.
    fn supports_deletion(&self) -> bool {
        false
    }

    /// Delete `id`. Returns `true` if it was present.
    fn remove(&self, _id: &ContentId) -> StoreResult<bool> {
        Err(StoreError::DeletionUnsupported)
    }

    /// Read the payload for `id`, failing with [`StoreError::NotFound`] if
    /// it is absent.
    fn fetch(&self, id: &ContentId) -> StoreResult<Bytes> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// The id `data` would be stored under. Pure.
    fn key_for(&self, data: &[u8]) -> ContentId {
        self.scheme().key_for(data)
    }

    /// Shared content cache consulted by resolvable ids, if this store has one.
    fn cache(&self) -> Option<&ContentCache> {
        None
    }
}
