use tracing::debug;
use trellis_crypto::SchemeRef;
use trellis_datum::{MapDatum, SetDatum, ShardedMapDatum};
use trellis_store::Repo;

use crate::closure::ClosureBuilder;
use crate::error::{StuffError, StuffResult};
use crate::stuffed::Stuffed;

/// Structures that can be packed into, and rebuilt from, a [`Stuffed`]
/// bundle.
pub trait Stuffable: Sized {
    /// Error type; every bundle failure converts into it.
    type Error: From<StuffError>;

    /// Gather this structure and everything it references from `source`
    /// into a bundle for `target`. Fails without a partial bundle if any
    /// reference is missing.
    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> Result<Stuffed, Self::Error>;

    /// Rebuild the structure from a bundle. The result resolves its
    /// references against the bundle, not the original store.
    fn init(stuffed: &Stuffed) -> Result<Self, Self::Error>;
}

impl Stuffable for SetDatum {
    type Error = StuffError;

    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> StuffResult<Stuffed> {
        let closure = ClosureBuilder::new(source, self.scheme(), target)?;
        let top = closure.add_set(self)?;
        debug!(set = %top.short_hex(), members = self.len(), "stuffing set");
        closure.finish(&top)
    }

    fn init(stuffed: &Stuffed) -> StuffResult<Self> {
        let bytes = stuffed.top_bytes()?;
        Ok(SetDatum::from_bytes(stuffed.scheme(), &bytes)?.bind(stuffed.as_repo()))
    }
}

impl Stuffable for MapDatum {
    type Error = StuffError;

    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> StuffResult<Stuffed> {
        let closure = ClosureBuilder::new(source, self.scheme(), target)?;
        let top = closure.add_map(self)?;
        debug!(map = %top.short_hex(), fields = self.len(), "stuffing map");
        closure.finish(&top)
    }

    fn init(stuffed: &Stuffed) -> StuffResult<Self> {
        Ok(MapDatum::read(&stuffed.as_repo(), stuffed.top_id())?)
    }
}

impl Stuffable for ShardedMapDatum {
    type Error = StuffError;

    fn stuff(&self, source: &dyn Repo, target: &SchemeRef) -> StuffResult<Stuffed> {
        let closure = ClosureBuilder::new(source, self.scheme(), target)?;
        let top = closure.add_sharded(self)?;
        debug!(sharded = %top.short_hex(), shards = self.len(), "stuffing sharded map");
        closure.finish(&top)
    }

    fn init(stuffed: &Stuffed) -> StuffResult<Self> {
        Ok(ShardedMapDatum::read(&stuffed.as_repo(), stuffed.top_id())?)
    }
}
