//! Pattern matching, consumed as an injected capability.
//!
//! Trellis does not ship a pattern language. Callers hand a [`Pattern`] to
//! [`GraphIndex::matching`](crate::GraphIndex::matching), and a
//! [`PatternInflator`] to [`GraphDatum::patterns`](crate::GraphDatum::patterns)
//! to turn the ids in an edge's `PATTERNS` field into live patterns.

use trellis_types::ContentId;

use crate::data::GraphData;
use crate::edge::GraphDatum;
use crate::error::GraphResult;

/// Boxed iterator over matching subgraphs.
pub type Matches<'a> = Box<dyn Iterator<Item = GraphData> + 'a>;

/// A predicate over edges and graphs.
///
/// The match iterators are lazy, and calling them again starts over.
pub trait Pattern: Send + Sync {
    /// Whether `edge` could be part of a match.
    fn is_partial_match(&self, edge: &GraphDatum) -> bool;

    /// Whether any edge of `graph` could be part of a match.
    fn is_partial_match_graph(&self, graph: &GraphData) -> bool {
        graph.iter().any(|edge| self.is_partial_match(edge))
    }

    /// Whether `graph` satisfies the whole pattern.
    fn is_complete_match(&self, graph: &GraphData) -> bool;

    /// Subgraphs of `graph` that partially match. Defaults to every
    /// partially matching edge on its own.
    fn partial_matches<'a>(&'a self, graph: &'a GraphData) -> Matches<'a> {
        Box::new(
            graph
                .iter()
                .filter(move |edge| self.is_partial_match(edge))
                .map(|edge| GraphData::from_edge(edge.clone())),
        )
    }

    /// Subgraphs of `graph` that completely match. Defaults to `graph`
    /// itself when it is a complete match.
    fn complete_matches<'a>(&'a self, graph: &'a GraphData) -> Matches<'a> {
        if self.is_complete_match(graph) {
            Box::new(std::iter::once(graph.clone()))
        } else {
            Box::new(std::iter::empty())
        }
    }
}

/// Turns a stored pattern id into a [`Pattern`].
pub trait PatternInflator: Send + Sync {
    fn inflate(&self, id: &ContentId) -> GraphResult<Box<dyn Pattern>>;
}
