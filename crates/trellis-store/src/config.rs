//! Repo configuration, loadable from TOML.
//!
//! ```toml
//! [replication]
//! workers = 2
//! queue_capacity = 64
//! saturation = "drop_and_count"
//!
//! [cache]
//! enabled = true
//! capacity_bytes = 67108864
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::replicator::SaturationPolicy;

/// Top-level configuration of a [`ReplicatedRepo`](crate::ReplicatedRepo).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub replication: ReplicationConfig,
    pub cache: CacheConfig,
}

/// Background replication pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Worker threads draining the replication queue.
    pub workers: usize,
    /// Tasks that may wait in the queue. Zero means hand-off only: a task is
    /// accepted only when a worker is idle.
    pub queue_capacity: usize,
    /// What `put` does when the queue is full.
    pub saturation: SaturationPolicy,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            saturation: SaturationPolicy::DropAndCount,
        }
    }
}

/// Content cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity_bytes: 64 * 1024 * 1024,
        }
    }
}

impl RepoConfig {
    /// Parse from TOML text. Missing sections take their defaults.
    pub fn from_toml_str(contents: &str) -> StoreResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.replication.workers == 0 {
            return Err(StoreError::Config(
                "replication.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
