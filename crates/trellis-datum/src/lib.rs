//! Persistent, content-addressed collections for Trellis.
//!
//! A [`SetDatum`] is a sorted set of content ids; a [`MapDatum`] maps content
//! ids to sets; a [`ShardedMapDatum`] maps content ids to maps. Each has a
//! bit-exact serialization, and its own id is the digest of that
//! serialization, so collections nest into a Merkle DAG.
//!
//! # Lifecycle
//!
//! Collections start out *building*: exclusively owned and mutable. After
//! [`freeze`](SetDatum::freeze) their storage is shared behind an `Arc`,
//! readers may run concurrently, and the id is computed at most once.
//! Builder methods (`build*`) on a frozen collection return a new building
//! copy and leave every other handle untouched. In-place mutators
//! (`insert*`) refuse frozen collections with [`DatumError::Immutable`].
//!
//! # Layout
//!
//! - set: member ids, ascending, concatenated
//! - map: for each key ascending, the key id followed by the id of its set
//! - sharded map: for each shard ascending, the shard id followed by the id
//!   of its map
//!
//! Empty collections serialize to zero bytes.

mod codec;
pub mod error;
pub mod map;
pub mod metadata;
pub mod set;
pub mod sharded;

pub use error::{DatumError, DatumResult};
pub use map::MapDatum;
pub use metadata::{describe, describe_bytes, is_node, MetadataField, TypeValue};
pub use set::SetDatum;
pub use sharded::ShardedMapDatum;
