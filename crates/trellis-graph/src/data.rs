use std::collections::BTreeMap;

use trellis_crypto::SchemeRef;
use trellis_datum::SetDatum;
use trellis_types::{ContentId, TypeError};

use crate::edge::GraphDatum;
use crate::error::GraphResult;

/// An ordered collection of edges of one scheme, keyed by edge id.
#[derive(Clone, Debug)]
pub struct GraphData {
    scheme: SchemeRef,
    edges: BTreeMap<ContentId, GraphDatum>,
}

impl GraphData {
    pub fn new(scheme: SchemeRef) -> Self {
        Self {
            scheme,
            edges: BTreeMap::new(),
        }
    }

    /// A collection holding just `edge`.
    pub fn from_edge(edge: GraphDatum) -> Self {
        let mut data = Self::new(edge.scheme().clone());
        data.push(edge);
        data
    }

    pub fn scheme(&self) -> &SchemeRef {
        &self.scheme
    }

    /// Add `edge`. Returns `false` if an edge with the same id was present.
    pub fn insert(&mut self, edge: GraphDatum) -> GraphResult<bool> {
        if edge.scheme().tag() != self.scheme.tag() {
            return Err(TypeError::SchemeMismatch {
                expected: self.scheme.tag(),
                actual: edge.scheme().tag(),
            }
            .into());
        }
        Ok(self.push(edge))
    }

    /// Insert an edge already known to share this collection's scheme.
    pub(crate) fn push(&mut self, edge: GraphDatum) -> bool {
        let id = edge.id();
        if self.edges.contains_key(&id) {
            return false;
        }
        self.edges.insert(id, edge);
        true
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn get(&self, id: &ContentId) -> Option<&GraphDatum> {
        self.edges.get(id)
    }

    /// Edges in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphDatum> + '_ {
        self.edges.values()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The edge ids as a frozen set.
    pub fn ids(&self) -> GraphResult<SetDatum> {
        let set = SetDatum::from_ids(self.scheme.clone(), self.edges.keys().cloned())?;
        Ok(set.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trellis_crypto::{default_scheme, Blake3Scheme};
    use trellis_store::{ReplicatedRepo, Repo};

    use crate::field::EdgeField;

    fn edge(repo: &Arc<dyn Repo>, subject: &[u8]) -> GraphDatum {
        GraphDatum::builder(repo)
            .unwrap()
            .with(EdgeField::Subjects, repo.put(subject).unwrap())
            .unwrap()
            .finish()
            .unwrap()
    }

    #[test]
    fn insert_dedupes_by_id() {
        let repo: Arc<dyn Repo> = Arc::new(ReplicatedRepo::in_memory(default_scheme()));
        let mut data = GraphData::new(default_scheme());
        assert!(data.insert(edge(&repo, b"a")).unwrap());
        assert!(!data.insert(edge(&repo, b"a")).unwrap());
        assert!(data.insert(edge(&repo, b"b")).unwrap());
        assert_eq!(data.len(), 2);

        let ids = data.ids().unwrap();
        assert!(ids.is_frozen());
        assert!(data.iter().all(|e| ids.contains(&e.id())));
    }

    #[test]
    fn foreign_scheme_rejected() {
        let repo: Arc<dyn Repo> = Arc::new(ReplicatedRepo::in_memory(default_scheme()));
        let mut data = GraphData::new(Arc::new(Blake3Scheme));
        assert!(data.insert(edge(&repo, b"a")).is_err());
        assert!(data.is_empty());
    }

    #[test]
    fn from_edge_holds_one() {
        let repo: Arc<dyn Repo> = Arc::new(ReplicatedRepo::in_memory(default_scheme()));
        let e = edge(&repo, b"solo");
        let data = GraphData::from_edge(e.clone());
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(&e.id()), Some(&e));
    }
}
