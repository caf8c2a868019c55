use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use trellis_types::ContentId;

use crate::error::{StoreError, StoreResult};
use crate::storage::Storage;

/// In-memory, HashMap-based backend.
///
/// Intended for tests, embedding, and as the arena behind throwaway repos.
/// Payloads are `Bytes`, so reads hand out shared views without copying.
pub struct MemoryStorage {
    objects: RwLock<HashMap<ContentId, Bytes>>,
    deletable: bool,
}

impl MemoryStorage {
    /// Create a new empty backend that supports deletion.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            deletable: true,
        }
    }

    /// Create a backend that refuses deletion.
    pub fn append_only() -> Self {
        Self {
            deletable: false,
            ..Self::new()
        }
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put(&self, id: &ContentId, data: Bytes) -> StoreResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(id.clone()).or_insert(data);
        Ok(())
    }

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn supports_deletion(&self) -> bool {
        self.deletable
    }

    fn remove(&self, id: &ContentId) -> StoreResult<bool> {
        if !self.deletable {
            return Err(StoreError::DeletionUnsupported);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn describe(&self) -> String {
        format!("memory({} objects)", self.len())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("object_count", &self.len())
            .field("deletable", &self.deletable)
            .finish()
    }
}
