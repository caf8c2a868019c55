use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use trellis_crypto::SchemeRef;
use trellis_store::{Repo, ResolvableId};
use trellis_types::ContentId;

use crate::codec;
use crate::error::{DatumError, DatumResult};

#[derive(Clone)]
enum State {
    Building(BTreeSet<ContentId>),
    Frozen(Arc<Frozen>),
}

struct Frozen {
    members: BTreeSet<ContentId>,
    id: OnceLock<ContentId>,
}

/// Persistent sorted set of content ids of one scheme.
///
/// Cloning a frozen set shares its storage; cloning a building set copies it.
#[derive(Clone)]
pub struct SetDatum {
    scheme: SchemeRef,
    state: State,
    source: Option<Arc<dyn Repo>>,
}

impl SetDatum {
    /// An empty set in the building phase.
    pub fn new(scheme: SchemeRef) -> Self {
        Self {
            scheme,
            state: State::Building(BTreeSet::new()),
            source: None,
        }
    }

    /// An empty, frozen set.
    pub fn empty(scheme: SchemeRef) -> Self {
        Self::new(scheme).freeze()
    }

    /// A building set holding `ids`.
    pub fn from_ids(
        scheme: SchemeRef,
        ids: impl IntoIterator<Item = ContentId>,
    ) -> DatumResult<Self> {
        let mut set = Self::new(scheme);
        for id in ids {
            set.insert(id)?;
        }
        Ok(set)
    }

    pub fn scheme(&self) -> &SchemeRef {
        &self.scheme
    }

    fn members(&self) -> &BTreeSet<ContentId> {
        match &self.state {
            State::Building(members) => members,
            State::Frozen(frozen) => &frozen.members,
        }
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add `id` in place. Returns `true` if it was not already a member.
    pub fn insert(&mut self, id: ContentId) -> DatumResult<bool> {
        self.scheme.ensure_owns(&id)?;
        match &mut self.state {
            State::Building(members) => Ok(members.insert(id)),
            State::Frozen(_) => Err(DatumError::Immutable("set")),
        }
    }

    /// Add `id`, copying a frozen set into a new building one first.
    pub fn build(mut self, id: ContentId) -> DatumResult<Self> {
        self.scheme.ensure_owns(&id)?;
        self.thaw().insert(id);
        Ok(self)
    }

    /// Store `data` in `repo` and add its id.
    pub fn build_content(self, repo: &dyn Repo, data: &[u8]) -> DatumResult<Self> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        let id = repo.put(data)?;
        self.build(id)
    }

    /// Building members, copying out of frozen storage if needed.
    fn thaw(&mut self) -> &mut BTreeSet<ContentId> {
        if let State::Frozen(frozen) = &self.state {
            self.state = State::Building(frozen.members.clone());
        }
        match &mut self.state {
            State::Building(members) => members,
            State::Frozen(_) => unreachable!("thawed above"),
        }
    }

    /// End the building phase. Irreversible; a no-op on frozen sets.
    pub fn freeze(self) -> Self {
        let state = match self.state {
            State::Building(members) => State::Frozen(Arc::new(Frozen {
                members,
                id: OnceLock::new(),
            })),
            frozen => frozen,
        };
        Self { state, ..self }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.state, State::Frozen(_))
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn contains(&self, id: &ContentId) -> bool {
        self.members().contains(id)
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &ContentId> + '_ {
        self.members().iter()
    }

    /// Whether every member of `other` is a member of `self`.
    pub fn is_superset_of(&self, other: &SetDatum) -> bool {
        other.members().is_subset(self.members())
    }

    /// A building set of the members present in both.
    pub fn intersection(&self, other: &SetDatum) -> SetDatum {
        let members = self
            .members()
            .intersection(other.members())
            .cloned()
            .collect();
        Self {
            scheme: self.scheme.clone(),
            state: State::Building(members),
            source: self.source.clone(),
        }
    }

    /// A building set of the members present in either.
    pub fn union(&self, other: &SetDatum) -> SetDatum {
        let members = self.members().union(other.members()).cloned().collect();
        Self {
            scheme: self.scheme.clone(),
            state: State::Building(members),
            source: self.source.clone(),
        }
    }

    // ---------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------

    /// Member ids concatenated in ascending order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.scheme.key_length());
        for id in self.members() {
            out.extend_from_slice(id.as_bytes());
        }
        out
    }

    /// Digest of [`to_bytes`](Self::to_bytes). Cached once frozen.
    pub fn id(&self) -> ContentId {
        match &self.state {
            State::Building(_) => self.scheme.key_for(&self.to_bytes()),
            State::Frozen(frozen) => frozen
                .id
                .get_or_init(|| self.scheme.key_for(&self.to_bytes()))
                .clone(),
        }
    }

    /// Parse a serialized set. The result is frozen and unbound.
    pub fn from_bytes(scheme: SchemeRef, bytes: &[u8]) -> DatumResult<Self> {
        let mut members = BTreeSet::new();
        for record in codec::records("set", bytes, scheme.key_length())? {
            members.insert(scheme.id_from_bytes(record)?);
        }
        Ok(Self {
            scheme,
            state: State::Building(members),
            source: None,
        }
        .freeze())
    }

    /// Load the set stored under `id` and bind it to `source`.
    pub fn read(source: &Arc<dyn Repo>, id: &ContentId) -> DatumResult<Self> {
        let scheme = source.scheme();
        scheme.ensure_owns(id)?;
        let bytes = codec::fetch(source.as_ref(), id)?;
        Ok(Self::from_bytes(scheme, &bytes)?.bind(Arc::clone(source)))
    }

    /// Write the serialization to `repo`, returning the set's id.
    pub fn persist(&self, repo: &dyn Repo) -> DatumResult<ContentId> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        Ok(repo.put(&self.to_bytes())?)
    }

    // ---------------------------------------------------------------
    // Source binding
    // ---------------------------------------------------------------

    /// Attach the store members resolve against.
    pub fn bind(mut self, source: Arc<dyn Repo>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&Arc<dyn Repo>> {
        self.source.as_ref()
    }

    /// Members as ids that resolve against the bound source.
    pub fn resolvable(&self) -> DatumResult<Vec<ResolvableId>> {
        let source = self.source.as_ref().ok_or(DatumError::Unbound("set"))?;
        Ok(self
            .iter()
            .map(|id| ResolvableId::from_source(id.clone(), Arc::clone(source)))
            .collect())
    }
}

impl PartialEq for SetDatum {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.tag() == other.scheme.tag() && self.members() == other.members()
    }
}

impl Eq for SetDatum {}

impl fmt::Debug for SetDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetDatum")
            .field("scheme", &self.scheme.name())
            .field("frozen", &self.is_frozen())
            .field("members", &self.members())
            .finish()
    }
}
