//! Self-contained bundles of content for Trellis.
//!
//! *Stuffing* a structure walks everything it references, copies each
//! payload out of the source store into an append-only [`LinearVirtualRepo`],
//! and seals the result as a [`Stuffed`] bundle anchored at the structure's
//! id. The bundle is itself a read-only [`Repo`](trellis_store::Repo), so the
//! structure can be rebuilt from it with [`Stuffable::init`] after the
//! original store is gone.
//!
//! # Architecture
//!
//! - [`Stuffable`] -- the stuff/init protocol, implemented for
//!   [`SetDatum`](trellis_datum::SetDatum), [`MapDatum`](trellis_datum::MapDatum)
//!   and [`ShardedMapDatum`](trellis_datum::ShardedMapDatum)
//! - [`ClosureBuilder`] -- collects a closure; all-or-nothing
//! - [`LinearVirtualRepo`] -- append-only arena with linear lookup
//! - [`Stuffed`] -- sealed bundle plus top id
//! - [`SyncWriter`] / [`SyncReader`] -- id-checked stream framing
//!
//! # Framing
//!
//! ```text
//! [1 byte n][n bytes scheme tag]
//! repeated: [4 bytes BE length][payload][key_length bytes id]
//! ```

pub mod closure;
pub mod error;
pub mod stuffable;
pub mod stuffed;
pub mod virtual_repo;
pub mod wire;

pub use closure::ClosureBuilder;
pub use error::{StuffError, StuffResult};
pub use stuffable::Stuffable;
pub use stuffed::Stuffed;
pub use virtual_repo::LinearVirtualRepo;
pub use wire::{SyncReader, SyncWriter, MAX_ITEM_SIZE};
