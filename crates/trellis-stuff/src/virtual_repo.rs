use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use trellis_crypto::SchemeRef;
use trellis_store::{Repo, StoreError, StoreResult};
use trellis_types::ContentId;

use crate::error::StuffResult;
use crate::wire::SyncWriter;

/// Append-only, in-memory repo with linear-scan lookup.
///
/// Items keep their insertion order, which is the order a bundle is written
/// to a stream. Bundles are small, so a scan beats maintaining an index.
/// Once [`seal`](Self::seal)ed the repo refuses further puts.
pub struct LinearVirtualRepo {
    scheme: SchemeRef,
    items: RwLock<Vec<(ContentId, Bytes)>>,
    sealed: AtomicBool,
}

impl LinearVirtualRepo {
    pub fn new(scheme: SchemeRef) -> Self {
        Self {
            scheme,
            items: RwLock::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Append `data` unless already present. Returns its id.
    pub fn append(&self, data: Bytes) -> StoreResult<ContentId> {
        let id = self.scheme.key_for(&data);
        self.append_keyed(id.clone(), data)?;
        Ok(id)
    }

    /// Append a payload whose id the caller already verified.
    pub(crate) fn append_keyed(&self, id: ContentId, data: Bytes) -> StoreResult<bool> {
        if self.is_sealed() {
            return Err(StoreError::ReadOnly);
        }
        let mut items = self.items.write().expect("lock poisoned");
        if items.iter().any(|(existing, _)| *existing == id) {
            return Ok(false);
        }
        items.push((id, data));
        Ok(true)
    }

    /// Refuse all further writes. Irreversible.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.items.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().expect("lock poisoned").is_empty()
    }

    /// Items in insertion order.
    pub fn items(&self) -> Vec<(ContentId, Bytes)> {
        self.items.read().expect("lock poisoned").clone()
    }

    pub fn ids(&self) -> Vec<ContentId> {
        self.items
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Move `id` to the front, so it is the first item streamed.
    pub(crate) fn promote(&self, id: &ContentId) {
        let mut items = self.items.write().expect("lock poisoned");
        if let Some(pos) = items.iter().position(|(existing, _)| existing == id) {
            let item = items.remove(pos);
            items.insert(0, item);
        }
    }

    /// Serialize with the stream framing.
    pub fn to_bytes(&self) -> StuffResult<Vec<u8>> {
        let mut writer = SyncWriter::new(Vec::new(), Arc::clone(&self.scheme))?;
        for (_, data) in self.items.read().expect("lock poisoned").iter() {
            writer.write_item(data)?;
        }
        Ok(writer.finish()?)
    }

    /// Digest of the framed serialization.
    pub fn id(&self) -> StuffResult<ContentId> {
        Ok(self.scheme.key_for(&self.to_bytes()?))
    }
}

impl Repo for LinearVirtualRepo {
    fn scheme(&self) -> SchemeRef {
        Arc::clone(&self.scheme)
    }

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool> {
        self.scheme.ensure_owns(id)?;
        let items = self.items.read().expect("lock poisoned");
        Ok(items.iter().any(|(existing, _)| existing == id))
    }

    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        self.scheme.ensure_owns(id)?;
        let items = self.items.read().expect("lock poisoned");
        Ok(items
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, data)| data.clone()))
    }

    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        self.append(Bytes::copy_from_slice(data))
    }
}

impl std::fmt::Debug for LinearVirtualRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearVirtualRepo")
            .field("scheme", &self.scheme.name())
            .field("items", &self.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
