//! Graph data model for Trellis.
//!
//! An edge ([`GraphDatum`]) is a [`MapDatum`](trellis_datum::MapDatum) with
//! six canonical fields, each holding a *set* of node references. Nodes are
//! metadata documents whose `CONTENT` field names the values they stand for.
//! [`GraphIndex`] keeps one inverted index per field, mapping those content
//! ids (not the node ids) to the edges that reference them.
//!
//! # Key Types
//!
//! - [`EdgeField`] -- the six canonical fields
//! - [`GraphDatum`] / [`EdgeBuilder`] -- edges and their construction
//! - [`GraphData`] -- an ordered collection of edges
//! - [`GraphIndex`] -- per-field inverted indices with AND/OR queries, stored
//!   as a [`ShardedMapDatum`](trellis_datum::ShardedMapDatum) and stuffable
//! - [`Pattern`] / [`PatternInflator`] -- injected matching capability
//!
//! # Invariants
//!
//! - Every edge carries all six canonical fields, possibly empty.
//! - Adding an edge to an index is idempotent.
//! - Query results are sets of edge ids; an unindexed term yields an empty set.

pub mod data;
pub mod edge;
pub mod error;
pub mod field;
pub mod index;
pub mod pattern;

pub use data::GraphData;
pub use edge::{EdgeBuilder, GraphDatum};
pub use error::{GraphError, GraphResult};
pub use field::EdgeField;
pub use index::GraphIndex;
pub use pattern::{Pattern, PatternInflator};
