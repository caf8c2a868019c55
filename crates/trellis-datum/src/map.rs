use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;
use trellis_crypto::{CidScheme, SchemeRef};
use trellis_store::Repo;
use trellis_types::{ContentId, TypeError};

use crate::codec;
use crate::error::{DatumError, DatumResult};
use crate::set::SetDatum;

type Entries = BTreeMap<ContentId, SetDatum>;

#[derive(Clone)]
enum State {
    Building(Entries),
    Frozen(Arc<Frozen>),
}

struct Frozen {
    entries: Entries,
    id: OnceLock<ContentId>,
}

/// Persistent sorted map from content id to [`SetDatum`].
///
/// Fields are multi-valued: every key maps to a set. Keys are usually the
/// digest of a symbolic field name (see [`MapDatum::field_key`]).
#[derive(Clone)]
pub struct MapDatum {
    scheme: SchemeRef,
    state: State,
    source: Option<Arc<dyn Repo>>,
}

impl MapDatum {
    /// An empty map in the building phase.
    pub fn new(scheme: SchemeRef) -> Self {
        Self {
            scheme,
            state: State::Building(BTreeMap::new()),
            source: None,
        }
    }

    pub fn scheme(&self) -> &SchemeRef {
        &self.scheme
    }

    /// The key a symbolic field name is stored under.
    pub fn field_key(scheme: &dyn CidScheme, name: &str) -> ContentId {
        scheme.key_for(name.as_bytes())
    }

    fn entries(&self) -> &Entries {
        match &self.state {
            State::Building(entries) => entries,
            State::Frozen(frozen) => &frozen.entries,
        }
    }

    fn entries_mut(&mut self) -> DatumResult<&mut Entries> {
        match &mut self.state {
            State::Building(entries) => Ok(entries),
            State::Frozen(_) => Err(DatumError::Immutable("map")),
        }
    }

    /// Building entries, copying out of frozen storage if needed.
    fn thaw(&mut self) -> &mut Entries {
        if let State::Frozen(frozen) = &self.state {
            self.state = State::Building(frozen.entries.clone());
        }
        match &mut self.state {
            State::Building(entries) => entries,
            State::Frozen(_) => unreachable!("thawed above"),
        }
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add `value` to the set at `key` in place, creating the set if needed.
    pub fn insert_ref(&mut self, key: ContentId, value: ContentId) -> DatumResult<()> {
        self.scheme.ensure_owns(&key)?;
        self.scheme.ensure_owns(&value)?;
        let scheme = self.scheme.clone();
        let entries = self.entries_mut()?;
        Self::merge(entries, scheme, key, value)
    }

    /// Replace the set at `key` in place.
    pub fn insert_set(&mut self, key: ContentId, set: SetDatum) -> DatumResult<()> {
        self.check_set(&key, &set)?;
        self.entries_mut()?.insert(key, set);
        Ok(())
    }

    /// Add `value` to the set at `key`, copying a frozen map first.
    pub fn build_ref(mut self, key: ContentId, value: ContentId) -> DatumResult<Self> {
        self.scheme.ensure_owns(&key)?;
        self.scheme.ensure_owns(&value)?;
        let scheme = self.scheme.clone();
        Self::merge(self.thaw(), scheme, key, value)?;
        Ok(self)
    }

    /// Replace the set at `key`, copying a frozen map first.
    pub fn build_set(mut self, key: ContentId, set: SetDatum) -> DatumResult<Self> {
        self.check_set(&key, &set)?;
        self.thaw().insert(key, set);
        Ok(self)
    }

    /// Store `name` and `content` in `repo`; add the content id under the
    /// name's id.
    pub fn build_field(self, repo: &dyn Repo, name: &str, content: &[u8]) -> DatumResult<Self> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        let value = repo.put(content)?;
        self.build_field_ref(repo, name, value)
    }

    /// Store `name` in `repo` and add `value` under the name's id.
    pub fn build_field_ref(
        self,
        repo: &dyn Repo,
        name: &str,
        value: ContentId,
    ) -> DatumResult<Self> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        let key = repo.put(name.as_bytes())?;
        self.build_ref(key, value)
    }

    fn merge(
        entries: &mut Entries,
        scheme: SchemeRef,
        key: ContentId,
        value: ContentId,
    ) -> DatumResult<()> {
        let set = entries
            .remove(&key)
            .unwrap_or_else(|| SetDatum::new(scheme));
        entries.insert(key, set.build(value)?);
        Ok(())
    }

    fn check_set(&self, key: &ContentId, set: &SetDatum) -> DatumResult<()> {
        self.scheme.ensure_owns(key)?;
        if set.scheme().tag() != self.scheme.tag() {
            return Err(TypeError::SchemeMismatch {
                expected: self.scheme.tag(),
                actual: set.scheme().tag(),
            }
            .into());
        }
        Ok(())
    }

    /// End the building phase, freezing every value set. Irreversible.
    pub fn freeze(self) -> Self {
        let state = match self.state {
            State::Building(entries) => State::Frozen(Arc::new(Frozen {
                entries: entries
                    .into_iter()
                    .map(|(key, set)| (key, set.freeze()))
                    .collect(),
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

    pub fn get(&self, key: &ContentId) -> Option<&SetDatum> {
        self.entries().get(key)
    }

    /// The set stored under a symbolic field name.
    pub fn get_field(&self, name: &str) -> Option<&SetDatum> {
        self.get(&Self::field_key(self.scheme.as_ref(), name))
    }

    pub fn contains_key(&self, key: &ContentId) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentId, &SetDatum)> + '_ {
        self.entries().iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContentId> + '_ {
        self.entries().keys()
    }

    // ---------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------

    /// For each key ascending: key bytes, then the value set's id bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let key_len = self.scheme.key_length();
        let mut out = Vec::with_capacity(self.len() * key_len * 2);
        for (key, set) in self.entries() {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(set.id().as_bytes());
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

    /// Parse a serialized map, asking `loader` for each value set by id.
    /// The result is frozen and unbound.
    pub fn decode<F>(scheme: SchemeRef, bytes: &[u8], mut loader: F) -> DatumResult<Self>
    where
        F: FnMut(&ContentId) -> DatumResult<SetDatum>,
    {
        let key_len = scheme.key_length();
        let mut entries = BTreeMap::new();
        for record in codec::records("map", bytes, key_len * 2)? {
            let key = scheme.id_from_bytes(&record[..key_len])?;
            let set_id = scheme.id_from_bytes(&record[key_len..])?;
            let set = loader(&set_id)?;
            entries.insert(key, set);
        }
        Ok(Self {
            scheme,
            state: State::Building(entries),
            source: None,
        }
        .freeze())
    }

    /// The keys of a serialized map, leaving its value sets unread.
    pub fn decode_keys(scheme: &dyn CidScheme, bytes: &[u8]) -> DatumResult<Vec<ContentId>> {
        let key_len = scheme.key_length();
        codec::records("map", bytes, key_len * 2)?
            .map(|record| Ok(scheme.id_from_bytes(&record[..key_len])?))
            .collect()
    }

    /// Load the map stored under `id`, with its value sets, and bind both to
    /// `source`.
    pub fn read(source: &Arc<dyn Repo>, id: &ContentId) -> DatumResult<Self> {
        let scheme = source.scheme();
        scheme.ensure_owns(id)?;
        let bytes = codec::fetch(source.as_ref(), id)?;
        let map = Self::decode(scheme, &bytes, |set_id| SetDatum::read(source, set_id))?;
        debug!(id = %id.short_hex(), fields = map.len(), "map read");
        Ok(map.bind(Arc::clone(source)))
    }

    /// Write every value set, then the map itself. Returns the map's id.
    pub fn persist(&self, repo: &dyn Repo) -> DatumResult<ContentId> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        for set in self.entries().values() {
            set.persist(repo)?;
        }
        Ok(repo.put(&self.to_bytes())?)
    }

    // ---------------------------------------------------------------
    // Source binding
    // ---------------------------------------------------------------

    /// Attach the store this map and its value sets resolve against.
    pub fn bind(mut self, source: Arc<dyn Repo>) -> Self {
        self.state = match self.state {
            State::Building(entries) => State::Building(
                entries
                    .into_iter()
                    .map(|(key, set)| (key, set.bind(Arc::clone(&source))))
                    .collect(),
            ),
            State::Frozen(frozen) => {
                let entries = frozen
                    .entries
                    .iter()
                    .map(|(key, set)| (key.clone(), set.clone().bind(Arc::clone(&source))))
                    .collect();
                let id = OnceLock::new();
                if let Some(cached) = frozen.id.get() {
                    let _ = id.set(cached.clone());
                }
                State::Frozen(Arc::new(Frozen { entries, id }))
            }
        };
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&Arc<dyn Repo>> {
        self.source.as_ref()
    }
}

impl PartialEq for MapDatum {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.tag() == other.scheme.tag() && self.entries() == other.entries()
    }
}

impl Eq for MapDatum {}

impl fmt::Debug for MapDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapDatum")
            .field("scheme", &self.scheme.name())
            .field("frozen", &self.is_frozen())
            .field("entries", &self.entries())
            .finish()
    }
}
