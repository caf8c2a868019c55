use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};
use trellis_crypto::SchemeRef;
use trellis_types::ContentId;

use crate::cache::ContentCache;
use crate::config::RepoConfig;
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStorage;
use crate::replicator::{ReplicationStats, Replicator, Targets};
use crate::repo::Repo;
use crate::storage::Storage;

/// A repo backed by one primary backend plus best-effort secondaries.
///
/// Writes land synchronously on the primary; the same payload is then queued
/// for every secondary on the [`Replicator`]. Reads go to the primary and
/// fall back to secondaries in registration order, verifying what they
/// return. Existence checks consult the primary only.
pub struct ReplicatedRepo {
    scheme: SchemeRef,
    primary: Arc<dyn Storage>,
    secondaries: Targets,
    replicator: Replicator,
    cache: Option<ContentCache>,
}

impl ReplicatedRepo {
    /// Create a repo with the default configuration.
    pub fn new(scheme: SchemeRef, primary: Arc<dyn Storage>) -> Self {
        Self::with_config(scheme, primary, &RepoConfig::default())
    }

    pub fn with_config(scheme: SchemeRef, primary: Arc<dyn Storage>, config: &RepoConfig) -> Self {
        let secondaries: Targets = Arc::new(RwLock::new(Vec::new()));
        let replicator = Replicator::new(&config.replication, Arc::clone(&secondaries));
        let cache = config
            .cache
            .enabled
            .then(|| ContentCache::new(config.cache.capacity_bytes));
        debug!(
            scheme = scheme.name(),
            primary = %primary.describe(),
            cache = config.cache.enabled,
            "repo operational"
        );
        Self {
            scheme,
            primary,
            secondaries,
            replicator,
            cache,
        }
    }

    /// A repo over a fresh [`MemoryStorage`] primary.
    pub fn in_memory(scheme: SchemeRef) -> Self {
        Self::new(scheme, Arc::new(MemoryStorage::new()))
    }

    pub fn primary(&self) -> &Arc<dyn Storage> {
        &self.primary
    }

    /// Register a secondary. Only payloads put afterwards are replicated to it.
    pub fn add_secondary(&self, storage: Arc<dyn Storage>) {
        debug!(secondary = %storage.describe(), "secondary added");
        self.secondaries
            .write()
            .expect("lock poisoned")
            .push(storage);
    }

    pub fn secondaries(&self) -> Vec<Arc<dyn Storage>> {
        self.secondaries.read().expect("lock poisoned").clone()
    }

    pub fn replication_stats(&self) -> ReplicationStats {
        self.replicator.stats()
    }

    /// Wait for queued replication to finish. Returns `true` if it did
    /// within `timeout`.
    pub fn wait_for_replication(&self, timeout: Duration) -> bool {
        self.replicator.wait_idle(timeout)
    }

    /// First valid copy among the secondaries. A corrupt replica is skipped;
    /// its mismatch is reported only when no other secondary serves `id`.
    fn get_from_secondaries(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        let mut mismatch = None;
        for secondary in self.secondaries() {
            let found = match secondary.get(id) {
                Ok(found) => found,
                Err(e) => {
                    warn!(id = %id.short_hex(), secondary = %secondary.describe(), error = %e, "secondary read failed");
                    continue;
                }
            };
            let Some(data) = found else {
                continue;
            };
            let computed = self.scheme.key_for(&data);
            if &computed != id {
                warn!(
                    id = %id.short_hex(),
                    computed = %computed.short_hex(),
                    secondary = %secondary.describe(),
                    "secondary holds a corrupt copy"
                );
                mismatch.get_or_insert(computed);
                continue;
            }
            debug!(id = %id.short_hex(), secondary = %secondary.describe(), "served from secondary");
            return Ok(Some(data));
        }
        match mismatch {
            Some(computed) => Err(StoreError::HashMismatch {
                id: id.clone(),
                computed,
            }),
            None => Ok(None),
        }
    }
}

impl Repo for ReplicatedRepo {
    fn scheme(&self) -> SchemeRef {
        Arc::clone(&self.scheme)
    }

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool> {
        self.scheme.ensure_owns(id)?;
        self.primary.contains_key(id)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        self.scheme.ensure_owns(id)?;
        if let Some(data) = self.primary.get(id)? {
            return Ok(Some(data));
        }
        self.get_from_secondaries(id)
    }

    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let id = self.scheme.key_for(data);
        let data = Bytes::copy_from_slice(data);
        self.primary.put(&id, data.clone())?;
        debug!(id = %id.short_hex(), bytes = data.len(), "put");
        self.replicator.submit(id.clone(), data);
        Ok(id)
    }

    fn supports_deletion(&self) -> bool {
        self.primary.supports_deletion()
    }

    fn remove(&self, id: &ContentId) -> StoreResult<bool> {
        self.scheme.ensure_owns(id)?;
        if !self.primary.supports_deletion() {
            return Err(StoreError::DeletionUnsupported);
        }
        let removed = self.primary.remove(id)?;
        for secondary in self.secondaries() {
            if !secondary.supports_deletion() {
                continue;
            }
            if let Err(e) = secondary.remove(id) {
                warn!(id = %id.short_hex(), secondary = %secondary.describe(), error = %e, "secondary remove failed");
            }
        }
        if let Some(cache) = &self.cache {
            cache.remove(id);
        }
        Ok(removed)
    }

    fn cache(&self) -> Option<&ContentCache> {
        self.cache.as_ref()
    }
}

impl std::fmt::Debug for ReplicatedRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedRepo")
            .field("scheme", &self.scheme.name())
            .field("primary", &self.primary.describe())
            .field("secondaries", &self.secondaries().len())
            .field("replication", &self.replicator.stats())
            .finish()
    }
}
