use bytes::Bytes;
use tracing::debug;
use trellis_crypto::SchemeRef;
use trellis_datum::{is_node, DatumError, MapDatum, SetDatum, ShardedMapDatum};
use trellis_store::Repo;
use trellis_types::{ContentId, TypeError};

use crate::error::{StuffError, StuffResult};
use crate::stuffed::Stuffed;
use crate::virtual_repo::LinearVirtualRepo;

/// Collects the transitive closure of a structure into a fresh arena.
///
/// Bytes the caller already holds go in with `add_local`; everything else
/// is fetched from the source store, and any absent reference fails the
/// whole build. Nothing escapes until [`finish`](Self::finish), so a failed
/// build never yields a partial bundle.
pub struct ClosureBuilder<'a> {
    source: &'a dyn Repo,
    arena: LinearVirtualRepo,
}

impl<'a> ClosureBuilder<'a> {
    /// Start a closure over structures of `scheme`, packed for `target`.
    ///
    /// Embedded references are digests under `scheme`, so a `target` with a
    /// different tag, or a source of another scheme, is rejected.
    pub fn new(source: &'a dyn Repo, scheme: &SchemeRef, target: &SchemeRef) -> StuffResult<Self> {
        for other in [target.tag(), source.scheme().tag()] {
            if other != scheme.tag() {
                return Err(TypeError::SchemeMismatch {
                    expected: scheme.tag(),
                    actual: other,
                }
                .into());
            }
        }
        Ok(Self {
            source,
            arena: LinearVirtualRepo::new(scheme.clone()),
        })
    }

    /// The store references are fetched from.
    pub fn source(&self) -> &'a dyn Repo {
        self.source
    }

    /// Add bytes the caller already holds.
    pub fn add_local(&self, data: &[u8]) -> StuffResult<ContentId> {
        Ok(self.arena.append(Bytes::copy_from_slice(data))?)
    }

    /// Fetch `id` from the source and add it.
    pub fn add_ref(&self, id: &ContentId) -> StuffResult<Bytes> {
        if let Some(data) = self.arena.get(id)? {
            return Ok(data);
        }
        let data = self
            .source
            .get(id)?
            .ok_or_else(|| StuffError::Missing(id.clone()))?;
        self.arena.append_keyed(id.clone(), data.clone())?;
        Ok(data)
    }

    /// Add a set's own bytes and fetch every member.
    pub fn add_set(&self, set: &SetDatum) -> StuffResult<ContentId> {
        let id = self.add_local(&set.to_bytes())?;
        self.add_members(set)?;
        Ok(id)
    }

    /// Fetch every member of `set`.
    pub fn add_members(&self, set: &SetDatum) -> StuffResult<()> {
        for member in set.iter() {
            self.add_ref(member)?;
        }
        Ok(())
    }

    /// Add a map's own bytes and value sets, fetching keys and members.
    pub fn add_map(&self, map: &MapDatum) -> StuffResult<ContentId> {
        let id = self.add_local(&map.to_bytes())?;
        for (key, set) in map.iter() {
            self.add_ref(key)?;
            self.add_set(set)?;
        }
        Ok(id)
    }

    /// Fetch a stored map, its value sets, keys and members. Returns the
    /// decoded (unbound) map.
    pub fn add_map_ref(&self, id: &ContentId) -> StuffResult<MapDatum> {
        let scheme = self.arena.scheme();
        let bytes = self.add_ref(id)?;
        let mut failure = None;
        let decoded = MapDatum::decode(scheme.clone(), &bytes, |set_id| match self.add_ref(set_id) {
            Ok(set_bytes) => SetDatum::from_bytes(scheme.clone(), &set_bytes),
            Err(e) => {
                failure = Some(e);
                Err(DatumError::Missing(set_id.clone()))
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        let map = decoded?;
        for (key, set) in map.iter() {
            self.add_ref(key)?;
            self.add_members(set)?;
        }
        Ok(map)
    }

    /// Fetch `id` and, when its bytes lay out as a node document, the node's
    /// closure. Anything else is carried as opaque content and yields `None`.
    ///
    /// A node whose own references are missing still fails the build.
    pub fn add_node_ref(&self, id: &ContentId) -> StuffResult<Option<MapDatum>> {
        let bytes = self.add_ref(id)?;
        if !is_node(self.arena.scheme().as_ref(), &bytes) {
            return Ok(None);
        }
        self.add_map_ref(id).map(Some)
    }

    /// Add a sharded map's own bytes, then each shard key and shard map.
    pub fn add_sharded(&self, sharded: &ShardedMapDatum) -> StuffResult<ContentId> {
        let id = self.add_local(&sharded.to_bytes())?;
        for (shard, map) in sharded.iter() {
            self.add_ref(shard)?;
            self.add_map(map)?;
        }
        Ok(id)
    }

    /// Items collected so far.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Seal the closure into a bundle anchored at `top`.
    pub fn finish(self, top: &ContentId) -> StuffResult<Stuffed> {
        self.arena.promote(top);
        debug!(top = %top.short_hex(), items = self.arena.len(), "closure sealed");
        Stuffed::new(self.arena, top.clone())
    }
}
