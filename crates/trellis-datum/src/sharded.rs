use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;
use trellis_crypto::SchemeRef;
use trellis_store::Repo;
use trellis_types::{ContentId, TypeError};

use crate::codec;
use crate::error::{DatumError, DatumResult};
use crate::map::MapDatum;
use crate::set::SetDatum;

type Shards = BTreeMap<ContentId, MapDatum>;

#[derive(Clone)]
enum State {
    Building(Shards),
    Frozen(Arc<Frozen>),
}

struct Frozen {
    shards: Shards,
    id: OnceLock<ContentId>,
}

/// A map of maps: shard id to [`MapDatum`].
///
/// Meant for indices split by indexing function or by section. The shard
/// key usually names the index, and each shard maps a term to the set of
/// ids it was recorded against. Lifecycle and copy-on-write rules are the
/// same as [`MapDatum`].
#[derive(Clone)]
pub struct ShardedMapDatum {
    scheme: SchemeRef,
    state: State,
    source: Option<Arc<dyn Repo>>,
}

impl ShardedMapDatum {
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

    fn shards(&self) -> &Shards {
        match &self.state {
            State::Building(shards) => shards,
            State::Frozen(frozen) => &frozen.shards,
        }
    }

    fn shards_mut(&mut self) -> DatumResult<&mut Shards> {
        match &mut self.state {
            State::Building(shards) => Ok(shards),
            State::Frozen(_) => Err(DatumError::Immutable("sharded map")),
        }
    }

    fn thaw(&mut self) -> &mut Shards {
        if let State::Frozen(frozen) = &self.state {
            self.state = State::Building(frozen.shards.clone());
        }
        match &mut self.state {
            State::Building(shards) => shards,
            State::Frozen(_) => unreachable!("thawed above"),
        }
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Record `value` under `key` in the shard `shard`, in place.
    pub fn insert_ref(&mut self, shard: ContentId, key: ContentId, value: ContentId) -> DatumResult<()> {
        self.scheme.ensure_owns(&shard)?;
        let scheme = self.scheme.clone();
        Self::record(self.shards_mut()?, scheme, shard, key, value)
    }

    /// Replace the shard `shard` in place.
    pub fn insert_map(&mut self, shard: ContentId, map: MapDatum) -> DatumResult<()> {
        self.check_map(&shard, &map)?;
        self.shards_mut()?.insert(shard, map);
        Ok(())
    }

    /// Record `value` under `key` in the shard `shard`, copying a frozen
    /// instance first.
    pub fn build_ref(mut self, shard: ContentId, key: ContentId, value: ContentId) -> DatumResult<Self> {
        self.scheme.ensure_owns(&shard)?;
        let scheme = self.scheme.clone();
        Self::record(self.thaw(), scheme, shard, key, value)?;
        Ok(self)
    }

    /// Replace the shard `shard`, copying a frozen instance first.
    pub fn build_map(mut self, shard: ContentId, map: MapDatum) -> DatumResult<Self> {
        self.check_map(&shard, &map)?;
        self.thaw().insert(shard, map);
        Ok(self)
    }

    fn record(
        shards: &mut Shards,
        scheme: SchemeRef,
        shard: ContentId,
        key: ContentId,
        value: ContentId,
    ) -> DatumResult<()> {
        let map = shards
            .remove(&shard)
            .unwrap_or_else(|| MapDatum::new(scheme));
        shards.insert(shard, map.build_ref(key, value)?);
        Ok(())
    }

    fn check_map(&self, shard: &ContentId, map: &MapDatum) -> DatumResult<()> {
        self.scheme.ensure_owns(shard)?;
        if map.scheme().tag() != self.scheme.tag() {
            return Err(TypeError::SchemeMismatch {
                expected: self.scheme.tag(),
                actual: map.scheme().tag(),
            }
            .into());
        }
        Ok(())
    }

    /// End the building phase, freezing every shard. Irreversible.
    pub fn freeze(self) -> Self {
        let state = match self.state {
            State::Building(shards) => State::Frozen(Arc::new(Frozen {
                shards: shards
                    .into_iter()
                    .map(|(shard, map)| (shard, map.freeze()))
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

    pub fn get(&self, shard: &ContentId) -> Option<&MapDatum> {
        self.shards().get(shard)
    }

    /// The ids recorded under `key` in shard `shard`; `None` when either is
    /// absent.
    pub fn query(&self, shard: &ContentId, key: &ContentId) -> Option<&SetDatum> {
        self.get(shard).and_then(|map| map.get(key))
    }

    /// Whether shard `shard` has an entry for `key`.
    pub fn is_indexed(&self, shard: &ContentId, key: &ContentId) -> bool {
        self.get(shard).is_some_and(|map| map.contains_key(key))
    }

    pub fn contains_key(&self, shard: &ContentId) -> bool {
        self.shards().contains_key(shard)
    }

    pub fn len(&self) -> usize {
        self.shards().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContentId, &MapDatum)> + '_ {
        self.shards().iter()
    }

    // ---------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------

    /// For each shard ascending: shard id, then the shard map's id.
    pub fn to_bytes(&self) -> Vec<u8> {
        let key_len = self.scheme.key_length();
        let mut out = Vec::with_capacity(self.len() * key_len * 2);
        for (shard, map) in self.shards() {
            out.extend_from_slice(shard.as_bytes());
            out.extend_from_slice(map.id().as_bytes());
        }
        out
    }

    pub fn id(&self) -> ContentId {
        match &self.state {
            State::Building(_) => self.scheme.key_for(&self.to_bytes()),
            State::Frozen(frozen) => frozen
                .id
                .get_or_init(|| self.scheme.key_for(&self.to_bytes()))
                .clone(),
        }
    }

    /// Parse a serialized instance, asking `loader` for each shard map.
    pub fn decode<F>(scheme: SchemeRef, bytes: &[u8], mut loader: F) -> DatumResult<Self>
    where
        F: FnMut(&ContentId) -> DatumResult<MapDatum>,
    {
        let key_len = scheme.key_length();
        let mut shards = BTreeMap::new();
        for record in codec::records("sharded map", bytes, key_len * 2)? {
            let shard = scheme.id_from_bytes(&record[..key_len])?;
            let map_id = scheme.id_from_bytes(&record[key_len..])?;
            shards.insert(shard, loader(&map_id)?);
        }
        Ok(Self {
            scheme,
            state: State::Building(shards),
            source: None,
        }
        .freeze())
    }

    /// Load the instance stored under `id` with all its shards, bound to
    /// `source`.
    pub fn read(source: &Arc<dyn Repo>, id: &ContentId) -> DatumResult<Self> {
        let scheme = source.scheme();
        scheme.ensure_owns(id)?;
        let bytes = codec::fetch(source.as_ref(), id)?;
        let sharded = Self::decode(scheme, &bytes, |map_id| MapDatum::read(source, map_id))?;
        debug!(id = %id.short_hex(), shards = sharded.len(), "sharded map read");
        Ok(sharded.bind(Arc::clone(source)))
    }

    /// Write every shard map, then this instance. Returns its id.
    pub fn persist(&self, repo: &dyn Repo) -> DatumResult<ContentId> {
        codec::ensure_repo(self.scheme.as_ref(), repo)?;
        for map in self.shards().values() {
            map.persist(repo)?;
        }
        Ok(repo.put(&self.to_bytes())?)
    }

    pub fn bind(mut self, source: Arc<dyn Repo>) -> Self {
        self.state = match self.state {
            State::Building(shards) => State::Building(
                shards
                    .into_iter()
                    .map(|(shard, map)| (shard, map.bind(Arc::clone(&source))))
                    .collect(),
            ),
            State::Frozen(frozen) => {
                let shards = frozen
                    .shards
                    .iter()
                    .map(|(shard, map)| (shard.clone(), map.clone().bind(Arc::clone(&source))))
                    .collect();
                let id = OnceLock::new();
                if let Some(cached) = frozen.id.get() {
                    let _ = id.set(cached.clone());
                }
                State::Frozen(Arc::new(Frozen { shards, id }))
            }
        };
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&Arc<dyn Repo>> {
        self.source.as_ref()
    }
}

impl PartialEq for ShardedMapDatum {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.tag() == other.scheme.tag() && self.shards() == other.shards()
    }
}

impl Eq for ShardedMapDatum {}

impl fmt::Debug for ShardedMapDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMapDatum")
            .field("scheme", &self.scheme.name())
            .field("frozen", &self.is_frozen())
            .field("shards", &self.shards())
            .finish()
    }
}
