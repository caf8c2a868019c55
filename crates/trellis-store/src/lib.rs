//! Content-addressed storage for Trellis.
//!
//! Every payload is stored under the digest of its bytes. The crate separates
//! two layers:
//!
//! - [`Storage`] -- a dumb key-value backend keyed by [`ContentId`]
//!   ([`MemoryStorage`], [`FsStorage`])
//! - [`Repo`] -- the contract the rest of Trellis programs against. It owns
//!   the scheme and computes ids. [`ReplicatedRepo`] writes synchronously to
//!   one primary backend and propagates to secondaries in the background.
//!
//! # Design Rules
//!
//! 1. Payloads are immutable once written (content-addressing guarantees this).
//! 2. `put` of identical bytes is idempotent and returns the same id.
//! 3. Absence is `Ok(None)` from `get`; [`Repo::fetch`] is the variant that
//!    turns absence into [`StoreError::NotFound`].
//! 4. Replication is best-effort. Its failures are counted and logged, never
//!    returned from `put`.
//! 5. Reads served by a secondary are verified against their id.

pub mod cache;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod replicated;
pub mod replicator;
pub mod repo;
pub mod resolvable;
pub mod storage;

// Re-export primary types at crate root for ergonomic imports.
pub use cache::{CacheStats, ContentCache};
pub use config::{CacheConfig, RepoConfig, ReplicationConfig};
pub use error::{StoreError, StoreResult};
pub use fs::FsStorage;
pub use memory::MemoryStorage;
pub use replicated::ReplicatedRepo;
pub use replicator::{ReplicationStats, Replicator, SaturationPolicy};
pub use repo::Repo;
pub use resolvable::{Origin, ResolvableId};
pub use storage::Storage;

pub use bytes::Bytes;
pub use trellis_crypto::{CidScheme, SchemeRef};
pub use trellis_types::ContentId;
