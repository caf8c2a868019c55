use std::fmt;
use std::sync::Arc;

use tracing::debug;
use trellis_crypto::SchemeRef;
use trellis_datum::{describe_bytes, MapDatum, SetDatum, TypeValue};
use trellis_store::Repo;
use trellis_stuff::{ClosureBuilder, Stuffable, Stuffed};
use trellis_types::ContentId;

use crate::error::{GraphError, GraphResult};
use crate::field::EdgeField;
use crate::pattern::{Pattern, PatternInflator};

/// A graph edge: a [`MapDatum`] carrying all six [`EdgeField`]s.
///
/// Each field holds a set of references, usually to node documents (see
/// [`describe`](trellis_datum::describe)). Non-canonical fields may sit
/// alongside the six and are carried through untouched.
#[derive(Clone)]
pub struct GraphDatum {
    map: MapDatum,
    // Canonical field sets in `EdgeField::ALL` order.
    fields: Vec<SetDatum>,
}

impl GraphDatum {
    /// Wrap `map`, checking that every canonical field is present.
    pub fn new(map: MapDatum) -> GraphResult<Self> {
        let scheme = map.scheme().clone();
        let fields = EdgeField::ALL
            .into_iter()
            .map(|field| {
                map.get(&field.key(scheme.as_ref()))
                    .cloned()
                    .ok_or(GraphError::MissingField(field))
            })
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self { map, fields })
    }

    /// Start a new edge whose field names and contents go to `repo`.
    pub fn builder(repo: &Arc<dyn Repo>) -> GraphResult<EdgeBuilder> {
        EdgeBuilder::new(repo)
    }

    /// Load the edge stored under `id` in `source`.
    pub fn read(source: &Arc<dyn Repo>, id: &ContentId) -> GraphResult<Self> {
        Self::new(MapDatum::read(source, id)?)
    }

    pub fn get(&self, field: EdgeField) -> &SetDatum {
        &self.fields[field.index()]
    }

    pub fn id(&self) -> ContentId {
        self.map.id()
    }

    pub fn scheme(&self) -> &SchemeRef {
        self.map.scheme()
    }

    pub fn map(&self) -> &MapDatum {
        &self.map
    }

    pub fn into_map(self) -> MapDatum {
        self.map
    }

    /// The store this edge was read from or built into.
    pub fn source(&self) -> Option<&Arc<dyn Repo>> {
        self.map.source()
    }

    /// Write the edge and its field sets to `repo`.
    pub fn persist(&self, repo: &dyn Repo) -> GraphResult<ContentId> {
        Ok(self.map.persist(repo)?)
    }

    /// Whether each canonical field of `self` contains every reference in
    /// the same field of `other`. Non-canonical fields are not compared.
    pub fn is_superset_of(&self, other: &GraphDatum) -> bool {
        EdgeField::ALL
            .into_iter()
            .all(|field| self.get(field).is_superset_of(other.get(field)))
    }

    /// Whether any of `others` is a subset of `self`.
    pub fn is_superset_of_any<'a>(&self, others: impl IntoIterator<Item = &'a GraphDatum>) -> bool {
        others.into_iter().any(|other| self.is_superset_of(other))
    }

    /// Inflate every id in the `PATTERNS` field.
    pub fn patterns(&self, inflator: &dyn PatternInflator) -> GraphResult<Vec<Box<dyn Pattern>>> {
        self.get(EdgeField::Patterns)
            .iter()
            .map(|id| inflator.inflate(id))
            .collect()
    }
}

impl PartialEq for GraphDatum {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl Eq for GraphDatum {}

impl fmt::Debug for GraphDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GraphDatum");
        for field in EdgeField::ALL {
            s.field(field.name(), &self.get(field).len());
        }
        s.field("fields", &self.map.len()).finish()
    }
}

/// Builds a [`GraphDatum`] against one store.
///
/// All six canonical fields start out empty. Field-adding methods add to the
/// existing set; [`with_set`](Self::with_set) replaces it.
pub struct EdgeBuilder {
    repo: Arc<dyn Repo>,
    map: MapDatum,
}

impl EdgeBuilder {
    fn new(repo: &Arc<dyn Repo>) -> GraphResult<Self> {
        let scheme = repo.scheme();
        let mut map = MapDatum::new(scheme.clone());
        for field in EdgeField::ALL {
            let key = repo.put(field.name().as_bytes())?;
            map.insert_set(key, SetDatum::new(scheme.clone()))?;
        }
        Ok(Self {
            repo: Arc::clone(repo),
            map,
        })
    }

    /// Add a reference to `field`.
    pub fn with(mut self, field: EdgeField, id: ContentId) -> GraphResult<Self> {
        self.map.insert_ref(field.key(self.repo.scheme().as_ref()), id)?;
        Ok(self)
    }

    /// Persist `node` and add a reference to it.
    pub fn with_node(self, field: EdgeField, node: &MapDatum) -> GraphResult<Self> {
        let id = node.persist(self.repo.as_ref())?;
        self.with(field, id)
    }

    /// Store `data`, describe it as a `kind` node and add the node.
    pub fn with_content(self, field: EdgeField, data: &[u8], kind: TypeValue) -> GraphResult<Self> {
        let node = describe_bytes(&self.repo, data, kind)?;
        self.with(field, node.id())
    }

    /// Replace the whole set at `field`.
    pub fn with_set(mut self, field: EdgeField, set: SetDatum) -> GraphResult<Self> {
        self.map
            .insert_set(field.key(self.repo.scheme().as_ref()), set)?;
        Ok(self)
    }

    /// Add `id` under a non-canonical field, storing the field's name.
    pub fn with_extra(mut self, name: &str, id: ContentId) -> GraphResult<Self> {
        self.map = self.map.build_field_ref(self.repo.as_ref(), name, id)?;
        Ok(self)
    }

    /// Freeze, persist and bind the edge to the builder's store.
    pub fn finish(self) -> GraphResult<GraphDatum> {
        let map = self.map.freeze();
        let id = map.persist(self.repo.as_ref())?;
        debug!(edge = %id.short_hex(), fields = map.len(), "edge built");
        GraphDatum::new(map.bind(self.repo))
    }
}

impl GraphDatum {
    /// Add the edge, its field sets, and the closure of every node it
    /// references to `closure`. Members that are not node documents are
    /// carried as opaque content.
    pub(crate) fn gather(&self, closure: &ClosureBuilder<'_>) -> GraphResult<ContentId> {
        let top = closure.add_map(&self.map)?;
        for field in EdgeField::ALL {
            for member in self.get(field).iter() {
                closure.add_node_ref(member)?;
            }
        }
        Ok(top)
    }
}

impl Stuffable for GraphDatum {
    type Error = GraphError;

    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> GraphResult<Stuffed> {
        let closure = ClosureBuilder::new(source, self.scheme(), target)?;
        let top = self.gather(&closure)?;
        debug!(edge = %top.short_hex(), items = closure.len(), "stuffing edge");
        Ok(closure.finish(&top)?)
    }

    fn init(stuffed: &Stuffed) -> GraphResult<Self> {
        Self::read(&stuffed.as_repo(), stuffed.top_id())
    }
}
