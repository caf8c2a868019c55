//! Inverted indices over edges.
//!
//! One [`MapDatum`] per canonical field maps a *term* to the set of edges
//! that mention it. Terms are content ids found in the `CONTENT` field of
//! the nodes an edge references, so two nodes describing the same value
//! index under the same term.

use std::sync::Arc;

use tracing::{debug, trace};
use trellis_crypto::SchemeRef;
use trellis_datum::{is_node, MapDatum, SetDatum, ShardedMapDatum};
use trellis_store::Repo;
use trellis_stuff::{ClosureBuilder, Stuffable, Stuffed};
use trellis_types::{ContentId, TypeError};

use crate::data::GraphData;
use crate::edge::GraphDatum;
use crate::error::{GraphError, GraphResult};
use crate::field::EdgeField;
use crate::pattern::Pattern;

/// Name of the shard listing every indexed edge.
const EDGES_FIELD: &str = "EDGES";

/// Six inverted indices plus the edges they were built from.
///
/// Stored as a [`ShardedMapDatum`]: one shard per field, keyed by the
/// field's key, plus an `EDGES` shard whose `EDGES` entry lists the edges.
pub struct GraphIndex {
    scheme: SchemeRef,
    // One index per field, in `EdgeField::ALL` order.
    indices: Vec<MapDatum>,
    edges: GraphData,
    fallback: Option<Arc<dyn Repo>>,
}

impl GraphIndex {
    pub fn new(scheme: SchemeRef) -> Self {
        Self {
            indices: EdgeField::ALL
                .iter()
                .map(|_| MapDatum::new(scheme.clone()))
                .collect(),
            edges: GraphData::new(scheme.clone()),
            scheme,
            fallback: None,
        }
    }

    /// Resolve nodes through `repo` when an edge's own store lacks them.
    pub fn with_fallback(mut self, repo: Arc<dyn Repo>) -> Self {
        self.fallback = Some(repo);
        self
    }

    pub fn scheme(&self) -> &SchemeRef {
        &self.scheme
    }

    // ---------------------------------------------------------------
    // Indexing
    // ---------------------------------------------------------------

    /// Index `edge`. Returns `true` once the edge is indexed, including
    /// when it already was.
    ///
    /// Every referenced node is resolved before any index changes, so a
    /// failure leaves the index as it was.
    pub fn add(&mut self, edge: &GraphDatum) -> GraphResult<bool> {
        let edge_id = edge.id();
        self.scheme.ensure_owns(&edge_id)?;
        if self.edges.contains(&edge_id) {
            trace!(edge = %edge_id.short_hex(), "edge already indexed");
            return Ok(true);
        }

        let mut postings = Vec::new();
        for field in EdgeField::ALL {
            for member in edge.get(field).iter() {
                let Some(content) = self.resolve_content(edge, member)? else {
                    continue;
                };
                for term in content.iter() {
                    self.scheme.ensure_owns(term)?;
                    postings.push((field, term.clone()));
                }
            }
        }

        let terms = postings.len();
        for (field, term) in postings {
            self.indices[field.index()].insert_ref(term, edge_id.clone())?;
        }
        self.edges.push(edge.clone());
        debug!(edge = %edge_id.short_hex(), terms, "edge indexed");
        Ok(true)
    }

    /// Index every edge in order, stopping at the first failure.
    pub fn add_all<'a>(&mut self, edges: impl IntoIterator<Item = &'a GraphDatum>) -> GraphResult<bool> {
        for edge in edges {
            self.add(edge)?;
        }
        Ok(true)
    }

    /// Index the edge at the top of a bundle, resolving its nodes there.
    pub fn add_stuffed(&mut self, stuffed: &Stuffed) -> GraphResult<bool> {
        let edge = GraphDatum::init(stuffed)?;
        self.add(&edge)
    }

    /// The `CONTENT` set of the node `id`, looked up in the edge's store and
    /// then the fallback. Members that are not node documents, and nodes
    /// without content, give `None`.
    fn resolve_content(&self, edge: &GraphDatum, id: &ContentId) -> GraphResult<Option<SetDatum>> {
        for repo in [edge.source(), self.fallback.as_ref()].into_iter().flatten() {
            if repo.scheme().tag() != self.scheme.tag() {
                return Err(TypeError::SchemeMismatch {
                    expected: self.scheme.tag(),
                    actual: repo.scheme().tag(),
                }
                .into());
            }
            let Some(bytes) = repo.get(id)? else {
                continue;
            };
            if !is_node(self.scheme.as_ref(), &bytes) {
                trace!(member = %id.short_hex(), "opaque member, no terms");
                return Ok(None);
            }
            let node = MapDatum::decode(self.scheme.clone(), &bytes, |set_id| SetDatum::read(repo, set_id))?;
            return Ok(node.content().cloned());
        }
        Err(GraphError::Unresolvable(id.clone()))
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Edges whose `field` mentions `term`.
    pub fn query(&self, field: EdgeField, term: &ContentId) -> SetDatum {
        match self.indices[field.index()].get(term) {
            Some(hits) => hits.clone().freeze(),
            None => SetDatum::empty(self.scheme.clone()),
        }
    }

    /// Edges matching every `(field, term)` pair in `partial`.
    ///
    /// Only canonical fields are consulted and absent ones match anything.
    /// A partial with no canonical fields, or with an empty one, matches
    /// nothing.
    pub fn query_edge(&self, partial: &MapDatum) -> SetDatum {
        let mut result: Option<SetDatum> = None;
        for field in EdgeField::ALL {
            let Some(terms) = partial.get(&field.key(self.scheme.as_ref())) else {
                continue;
            };
            if terms.is_empty() {
                return SetDatum::empty(self.scheme.clone());
            }
            for term in terms.iter() {
                let hits = self.query(field, term);
                result = Some(match result {
                    Some(acc) => acc.intersection(&hits),
                    None => hits,
                });
            }
        }
        match result {
            Some(set) => set.freeze(),
            None => SetDatum::empty(self.scheme.clone()),
        }
    }

    /// Edges mentioning `term` in any field.
    pub fn query_all(&self, term: &ContentId) -> SetDatum {
        EdgeField::ALL
            .into_iter()
            .fold(SetDatum::new(self.scheme.clone()), |acc, field| {
                acc.union(&self.query(field, term))
            })
            .freeze()
    }

    /// Every indexed edge.
    pub fn edges(&self) -> &GraphData {
        &self.edges
    }

    /// The raw inverted index for `field`.
    pub fn index(&self, field: EdgeField) -> &MapDatum {
        &self.indices[field.index()]
    }

    /// Indexed edges that `pattern` partially matches.
    pub fn matching(&self, pattern: &dyn Pattern) -> GraphData {
        let mut matched = GraphData::new(self.scheme.clone());
        for edge in self.edges.iter().filter(|edge| pattern.is_partial_match(edge)) {
            matched.push(edge.clone());
        }
        matched
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// The indices and edge list as one frozen [`ShardedMapDatum`].
    pub fn to_sharded(&self) -> GraphResult<ShardedMapDatum> {
        let scheme = self.scheme.as_ref();
        let mut sharded = ShardedMapDatum::new(self.scheme.clone());
        for field in EdgeField::ALL {
            sharded.insert_map(field.key(scheme), self.indices[field.index()].clone())?;
        }
        let edges_key = MapDatum::field_key(scheme, EDGES_FIELD);
        let listed = MapDatum::new(self.scheme.clone()).build_set(edges_key.clone(), self.edges.ids()?)?;
        sharded.insert_map(edges_key, listed)?;
        Ok(sharded.freeze())
    }

    /// Write the indices, every edge, and the shard names to `repo`. Returns
    /// the id of the sharded map.
    pub fn persist(&self, repo: &dyn Repo) -> GraphResult<ContentId> {
        for name in EdgeField::ALL.iter().map(|f| f.name()).chain([EDGES_FIELD]) {
            repo.put(name.as_bytes())?;
        }
        for edge in self.edges.iter() {
            edge.persist(repo)?;
        }
        let id = self.to_sharded()?.persist(repo)?;
        debug!(index = %id.short_hex(), edges = self.edges.len(), "graph index persisted");
        Ok(id)
    }

    /// Rebuild an index persisted under `id`. Edges resolve against
    /// `source`, which also becomes the fallback for later adds.
    pub fn load(source: &Arc<dyn Repo>, id: &ContentId) -> GraphResult<Self> {
        let sharded = ShardedMapDatum::read(source, id)?;
        Self::from_sharded(source, &sharded)
    }

    fn from_sharded(source: &Arc<dyn Repo>, sharded: &ShardedMapDatum) -> GraphResult<Self> {
        let scheme = source.scheme();
        let mut index = Self::new(scheme.clone()).with_fallback(Arc::clone(source));

        for field in EdgeField::ALL {
            let stored = sharded
                .get(&field.key(scheme.as_ref()))
                .ok_or(GraphError::MissingField(field))?;
            let target = &mut index.indices[field.index()];
            for (term, hits) in stored.iter() {
                target.insert_set(term.clone(), hits.clone())?;
            }
        }

        let edges_key = MapDatum::field_key(scheme.as_ref(), EDGES_FIELD);
        if let Some(listed) = sharded.query(&edges_key, &edges_key) {
            for edge_id in listed.iter() {
                index.edges.push(GraphDatum::read(source, edge_id)?);
            }
        }
        debug!(
            index = %sharded.id().short_hex(),
            edges = index.edges.len(),
            "graph index loaded"
        );
        Ok(index)
    }
}

impl Stuffable for GraphIndex {
    type Error = GraphError;

    /// Packs the indices, the shard names, and the full closure of every
    /// indexed edge, so the bundle loads with no other store.
    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> GraphResult<Stuffed> {
        let closure = ClosureBuilder::new(source, &self.scheme, target)?;
        for name in EdgeField::ALL.iter().map(|f| f.name()).chain([EDGES_FIELD]) {
            closure.add_local(name.as_bytes())?;
        }
        let top = closure.add_sharded(&self.to_sharded()?)?;
        for edge in self.edges.iter() {
            edge.gather(&closure)?;
        }
        debug!(index = %top.short_hex(), items = closure.len(), "stuffing graph index");
        Ok(closure.finish(&top)?)
    }

    fn init(stuffed: &Stuffed) -> GraphResult<Self> {
        Self::load(&stuffed.as_repo(), stuffed.top_id())
    }
}

impl std::fmt::Debug for GraphIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("GraphIndex");
        s.field("scheme", &self.scheme.name());
        for field in EdgeField::ALL {
            s.field(field.name(), &self.indices[field.index()].len());
        }
        s.field("edges", &self.edges.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::{default_scheme, CidScheme};
    use trellis_datum::{describe_bytes, TypeValue};
    use proptest::prelude::*;
    use trellis_store::ReplicatedRepo;

    fn repo() -> Arc<dyn Repo> {
        Arc::new(ReplicatedRepo::in_memory(default_scheme()))
    }

    fn subjects(repo: &Arc<dyn Repo>, values: &[&[u8]]) -> GraphDatum {
        let mut builder = GraphDatum::builder(repo).unwrap();
        for value in values {
            builder = builder
                .with_content(EdgeField::Subjects, value, TypeValue::Text)
                .unwrap();
        }
        builder.finish().unwrap()
    }

    fn partial(fields: &[(EdgeField, &[&[u8]])]) -> MapDatum {
        let scheme = default_scheme();
        let mut map = MapDatum::new(scheme.clone());
        for (field, terms) in fields {
            let set = SetDatum::from_ids(
                scheme.clone(),
                terms.iter().map(|t| scheme.key_for(t)),
            )
            .unwrap();
            map.insert_set(field.key(scheme.as_ref()), set).unwrap();
        }
        map
    }

    // ---------------------------------------------------------------
    // Term queries
    // ---------------------------------------------------------------

    #[test]
    fn query_by_term_and_intersection() {
        let repo = repo();
        let e1 = subjects(&repo, &[b"A"]);
        let e2 = subjects(&repo, &[b"A", b"B"]);
        let mut index = GraphIndex::new(default_scheme());
        assert!(index.add(&e1).unwrap());
        assert!(index.add(&e2).unwrap());

        let a = repo.key_for(b"A");
        let b = repo.key_for(b"B");
        let hits_a = index.query(EdgeField::Subjects, &a);
        assert_eq!(hits_a.len(), 2);
        assert!(hits_a.contains(&e1.id()) && hits_a.contains(&e2.id()));

        let hits_b = index.query(EdgeField::Subjects, &b);
        assert_eq!(hits_b.len(), 1);
        assert!(hits_b.contains(&e2.id()));

        let both = index.query_edge(&partial(&[(EdgeField::Subjects, &[b"A", b"B"])]));
        assert_eq!(both.len(), 1);
        assert!(both.contains(&e2.id()));
    }

    #[test]
    fn indexes_content_not_node_ids() {
        let repo = repo();
        let edge = subjects(&repo, &[b"alice"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add(&edge).unwrap();

        let node = edge.get(EdgeField::Subjects).iter().next().unwrap().clone();
        assert!(index.query(EdgeField::Subjects, &node).is_empty());
        assert!(index
            .query(EdgeField::Subjects, &repo.key_for(b"alice"))
            .contains(&edge.id()));
    }

    #[test]
    fn same_value_in_separate_stores_shares_a_term() {
        let one = repo();
        let two = repo();
        let e1 = subjects(&one, &[b"shared"]);
        let e2 = GraphDatum::builder(&two)
            .unwrap()
            .with_content(EdgeField::Subjects, b"shared", TypeValue::Raw)
            .unwrap()
            .finish()
            .unwrap();
        let mut index = GraphIndex::new(default_scheme());
        index.add_all([&e1, &e2]).unwrap();
        assert_eq!(
            index.query(EdgeField::Subjects, &one.key_for(b"shared")).len(),
            2
        );
    }

    #[test]
    fn unindexed_term_is_empty() {
        let index = GraphIndex::new(default_scheme());
        let hits = index.query(EdgeField::Objects, &default_scheme().key_for(b"none"));
        assert!(hits.is_empty());
        assert!(hits.is_frozen());
    }

    #[test]
    fn fields_are_indexed_separately() {
        let repo = repo();
        let edge = GraphDatum::builder(&repo)
            .unwrap()
            .with_content(EdgeField::Objects, b"x", TypeValue::Text)
            .unwrap()
            .with_content(EdgeField::Patterns, b"p", TypeValue::Pattern)
            .unwrap()
            .finish()
            .unwrap();
        let mut index = GraphIndex::new(default_scheme());
        index.add(&edge).unwrap();

        let x = repo.key_for(b"x");
        let p = repo.key_for(b"p");
        assert!(index.query(EdgeField::Objects, &x).contains(&edge.id()));
        assert!(index.query(EdgeField::Subjects, &x).is_empty());
        assert!(index.query(EdgeField::Patterns, &p).contains(&edge.id()));
        assert!(index.query(EdgeField::Authors, &p).is_empty());
        assert_eq!(index.index(EdgeField::Patterns).len(), 1);
        assert!(index.query_all(&x).contains(&edge.id()));
        assert!(index.query_all(&p).contains(&edge.id()));
    }

    // ---------------------------------------------------------------
    // Partial-edge queries
    // ---------------------------------------------------------------

    #[test]
    fn partial_query_edge_cases() {
        let repo = repo();
        let e1 = GraphDatum::builder(&repo)
            .unwrap()
            .with_content(EdgeField::Subjects, b"A", TypeValue::Text)
            .unwrap()
            .with_content(EdgeField::Objects, b"O", TypeValue::Text)
            .unwrap()
            .finish()
            .unwrap();
        let e2 = subjects(&repo, &[b"A"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add_all([&e1, &e2]).unwrap();

        // Absent fields are unconstrained.
        assert_eq!(
            index.query_edge(&partial(&[(EdgeField::Subjects, &[b"A"])])).len(),
            2
        );
        // AND across fields.
        let across = index.query_edge(&partial(&[
            (EdgeField::Subjects, &[b"A"]),
            (EdgeField::Objects, &[b"O"]),
        ]));
        assert_eq!(across.len(), 1);
        assert!(across.contains(&e1.id()));
        // A present but empty field matches nothing.
        assert!(index
            .query_edge(&partial(&[
                (EdgeField::Subjects, &[b"A"]),
                (EdgeField::Objects, &[]),
            ]))
            .is_empty());
        // Nothing to constrain on matches nothing.
        assert!(index.query_edge(&partial(&[])).is_empty());
    }

    #[test]
    fn partial_ignores_extra_fields() {
        let repo = repo();
        let edge = subjects(&repo, &[b"A"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add(&edge).unwrap();

        let scheme = default_scheme();
        let mut query = partial(&[(EdgeField::Subjects, &[b"A"])]);
        query
            .insert_ref(scheme.key_for(b"SIGNATURES"), scheme.key_for(b"unindexed"))
            .unwrap();
        assert!(index.query_edge(&query).contains(&edge.id()));
    }

    // ---------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------

    #[test]
    fn add_is_idempotent() {
        let repo = repo();
        let edge = subjects(&repo, &[b"A"]);
        let mut index = GraphIndex::new(default_scheme());
        assert!(index.add(&edge).unwrap());
        let before = index.index(EdgeField::Subjects).to_bytes();
        assert!(index.add(&edge).unwrap());
        assert_eq!(index.index(EdgeField::Subjects).to_bytes(), before);
        assert_eq!(index.edges().len(), 1);
    }

    #[test]
    fn unresolvable_member_fails_without_side_effects() {
        let scratch = repo();
        let repo = repo();
        let elsewhere = describe_bytes(&scratch, b"ghost", TypeValue::Text).unwrap();
        let edge = GraphDatum::builder(&repo)
            .unwrap()
            .with_content(EdgeField::Subjects, b"real", TypeValue::Text)
            .unwrap()
            .with(EdgeField::Objects, elsewhere.id())
            .unwrap()
            .finish()
            .unwrap();

        let mut index = GraphIndex::new(default_scheme());
        assert!(matches!(
            index.add(&edge),
            Err(GraphError::Unresolvable(id)) if id == elsewhere.id()
        ));
        assert!(index.index(EdgeField::Subjects).is_empty());
        assert!(index.edges().is_empty());

        let mut with_fallback = GraphIndex::new(default_scheme()).with_fallback(scratch);
        assert!(with_fallback.add(&edge).unwrap());
        assert!(with_fallback
            .query(EdgeField::Objects, &repo.key_for(b"ghost"))
            .contains(&edge.id()));
    }

    #[test]
    fn unbound_edge_needs_fallback() {
        let repo = repo();
        let bound = subjects(&repo, &[b"A"]);
        let detached = GraphDatum::new(
            MapDatum::decode(default_scheme(), &bound.map().to_bytes(), |set_id| {
                SetDatum::read(&repo, set_id)
            })
            .unwrap(),
        )
        .unwrap();
        assert!(detached.source().is_none());

        let mut index = GraphIndex::new(default_scheme());
        assert!(matches!(index.add(&detached), Err(GraphError::Unresolvable(_))));
        let mut index = GraphIndex::new(default_scheme()).with_fallback(Arc::clone(&repo));
        assert!(index.add(&detached).unwrap());
    }

    #[test]
    fn member_without_content_adds_no_terms() {
        let repo = repo();
        let bare = MapDatum::new(default_scheme()).freeze();
        let edge = GraphDatum::builder(&repo)
            .unwrap()
            .with_node(EdgeField::Subjects, &bare)
            .unwrap()
            .finish()
            .unwrap();
        let mut index = GraphIndex::new(default_scheme());
        assert!(index.add(&edge).unwrap());
        assert!(index.index(EdgeField::Subjects).is_empty());
        assert!(index.edges().contains(&edge.id()));
    }

    #[test]
    fn raw_members_add_no_terms() {
        let repo = repo();
        let edge = GraphDatum::builder(&repo)
            .unwrap()
            .with_content(EdgeField::Subjects, b"A", TypeValue::Text)
            .unwrap()
            .with(EdgeField::Authors, repo.put(b"raw author").unwrap())
            .unwrap()
            .with(EdgeField::Authors, repo.put(&[7u8; 128]).unwrap())
            .unwrap()
            .finish()
            .unwrap();
        edge.stuff(repo.as_ref(), &default_scheme()).unwrap();

        let mut index = GraphIndex::new(default_scheme());
        assert!(index.add(&edge).unwrap());
        assert!(index.index(EdgeField::Authors).is_empty());
        assert!(index
            .query(EdgeField::Subjects, &repo.key_for(b"A"))
            .contains(&edge.id()));
    }

    #[test]
    fn stuffed_edge_indexes_from_bundle() {
        let original = repo();
        let edge = subjects(&original, &[b"portable"]);
        let stuffed = edge.stuff(original.as_ref(), &default_scheme()).unwrap();
        drop(original);

        let mut index = GraphIndex::new(default_scheme());
        assert!(index.add_stuffed(&stuffed).unwrap());
        assert!(index
            .query(EdgeField::Subjects, &default_scheme().key_for(b"portable"))
            .contains(&edge.id()));
    }

    // ---------------------------------------------------------------
    // Patterns and persistence
    // ---------------------------------------------------------------

    struct MentionsSubject(ContentId);

    impl Pattern for MentionsSubject {
        fn is_partial_match(&self, edge: &GraphDatum) -> bool {
            edge.get(EdgeField::Subjects).contains(&self.0)
        }

        fn is_complete_match(&self, graph: &GraphData) -> bool {
            graph.iter().all(|edge| self.is_partial_match(edge))
        }
    }

    #[test]
    fn matching_uses_injected_pattern() {
        let repo = repo();
        let e1 = subjects(&repo, &[b"A"]);
        let e2 = subjects(&repo, &[b"B"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add_all([&e1, &e2]).unwrap();

        let node = e1.get(EdgeField::Subjects).iter().next().unwrap().clone();
        let pattern = MentionsSubject(node);
        let matched = index.matching(&pattern);
        assert_eq!(matched.len(), 1);
        assert!(matched.contains(&e1.id()));
        assert!(pattern.is_partial_match_graph(index.edges()));
        assert!(!pattern.is_complete_match(index.edges()));
        assert!(pattern.is_complete_match(&matched));
    }

    #[test]
    fn persist_and_load_preserve_queries() {
        let repo = repo();
        let e1 = subjects(&repo, &[b"A"]);
        let e2 = subjects(&repo, &[b"A", b"B"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add_all([&e1, &e2]).unwrap();

        let id = index.persist(repo.as_ref()).unwrap();
        let mut loaded = GraphIndex::load(&repo, &id).unwrap();
        let a = repo.key_for(b"A");
        assert_eq!(loaded.query(EdgeField::Subjects, &a), index.query(EdgeField::Subjects, &a));
        assert_eq!(loaded.edges().len(), 2);

        // Loaded indices accept further edges, and known ones stay no-ops.
        assert!(loaded.add(&e1).unwrap());
        let e3 = subjects(&repo, &[b"A", b"C"]);
        assert!(loaded.add(&e3).unwrap());
        assert_eq!(loaded.query(EdgeField::Subjects, &a).len(), 3);
        assert_eq!(index.query(EdgeField::Subjects, &a).len(), 2);
    }

    #[test]
    fn persisted_index_is_sharded_by_field() {
        let repo = repo();
        let edge = subjects(&repo, &[b"A"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add(&edge).unwrap();

        let id = index.persist(repo.as_ref()).unwrap();
        let sharded = ShardedMapDatum::read(&repo, &id).unwrap();
        assert_eq!(sharded.len(), 7);
        assert_eq!(sharded, index.to_sharded().unwrap());
        let scheme = default_scheme();
        let hits = sharded
            .query(&EdgeField::Subjects.key(scheme.as_ref()), &scheme.key_for(b"A"))
            .unwrap();
        assert!(hits.contains(&edge.id()));
        assert!(!sharded.is_indexed(&EdgeField::Objects.key(scheme.as_ref()), &scheme.key_for(b"A")));
        assert_eq!(repo.fetch(&scheme.key_for(b"EDGES")).unwrap(), &b"EDGES"[..]);
    }

    #[test]
    fn stuffed_index_loads_without_original_store() {
        let original = repo();
        let e1 = subjects(&original, &[b"A"]);
        let e2 = GraphDatum::builder(&original)
            .unwrap()
            .with_content(EdgeField::Subjects, b"B", TypeValue::Text)
            .unwrap()
            .with(EdgeField::Authors, original.put(&[7u8; 128]).unwrap())
            .unwrap()
            .finish()
            .unwrap();
        let mut index = GraphIndex::new(default_scheme());
        index.add_all([&e1, &e2]).unwrap();

        let stuffed = index.stuff(original.as_ref(), &default_scheme()).unwrap();
        drop(original);
        stuffed.verify().unwrap();

        let mut restored = GraphIndex::init(&stuffed).unwrap();
        let a = default_scheme().key_for(b"A");
        let b = default_scheme().key_for(b"B");
        assert_eq!(restored.query(EdgeField::Subjects, &a), index.query(EdgeField::Subjects, &a));
        assert!(restored.query(EdgeField::Subjects, &b).contains(&e2.id()));
        assert_eq!(restored.edges().len(), 2);
        assert_eq!(restored.edges().get(&e2.id()), Some(&e2));
        // Known edges stay no-ops, resolving against the bundle.
        assert!(restored.add(&e1).unwrap());
        assert_eq!(restored.query(EdgeField::Subjects, &a).len(), 1);
    }

    #[test]
    fn stuffing_index_with_unstored_edge_fails() {
        let original = repo();
        let scratch = repo();
        let stray = subjects(&scratch, &[b"A"]);
        let mut index = GraphIndex::new(default_scheme());
        index.add(&stray).unwrap();
        assert!(matches!(
            index.stuff(original.as_ref(), &default_scheme()),
            Err(GraphError::Stuff(trellis_stuff::StuffError::Missing(_)))
        ));
    }

    #[test]
    fn load_of_non_index_fails() {
        let repo = repo();
        let plain = MapDatum::new(default_scheme()).freeze();
        let id = plain.persist(repo.as_ref()).unwrap();
        assert!(matches!(
            GraphIndex::load(&repo, &id),
            Err(GraphError::MissingField(EdgeField::Subjects))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn query_returns_exactly_the_mentioning_edges(
            edges in proptest::collection::vec(
                proptest::collection::btree_set("[a-d]", 1..4),
                1..6,
            )
        ) {
            let repo = repo();
            let mut index = GraphIndex::new(default_scheme());
            let mut built = Vec::new();
            for values in &edges {
                let payloads: Vec<&[u8]> = values.iter().map(|v| v.as_bytes()).collect();
                let edge = subjects(&repo, &payloads);
                index.add(&edge).unwrap();
                built.push((edge, values));
            }
            for term in ["a", "b", "c", "d"] {
                let hits = index.query(EdgeField::Subjects, &repo.key_for(term.as_bytes()));
                for (edge, values) in &built {
                    prop_assert_eq!(hits.contains(&edge.id()), values.contains(term));
                }
            }
        }
    }
}
