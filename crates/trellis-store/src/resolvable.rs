use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use trellis_crypto::CidScheme;
use trellis_types::ContentId;

use crate::error::{StoreError, StoreResult};
use crate::repo::Repo;

/// Where a [`ResolvableId`] gets its bytes from.
#[derive(Clone)]
pub enum Origin {
    /// Look the id up in a store, through its content cache if it has one.
    Source(Arc<dyn Repo>),
    /// Freshly created content held directly; not necessarily persisted.
    Pretouched(Bytes),
}

/// A content id that knows how to fetch its own bytes.
///
/// Equality, ordering and hashing consider only the id.
#[derive(Clone)]
pub struct ResolvableId {
    id: ContentId,
    origin: Origin,
}

impl ResolvableId {
    pub fn from_source(id: ContentId, source: Arc<dyn Repo>) -> Self {
        Self {
            id,
            origin: Origin::Source(source),
        }
    }

    /// Wrap content that has just been produced, computing its id.
    pub fn pretouched(scheme: &dyn CidScheme, data: Bytes) -> Self {
        Self {
            id: scheme.key_for(&data),
            origin: Origin::Pretouched(data),
        }
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn into_id(self) -> ContentId {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The backing store, unless the content is pretouched.
    pub fn source(&self) -> Option<&Arc<dyn Repo>> {
        match &self.origin {
            Origin::Source(repo) => Some(repo),
            Origin::Pretouched(_) => None,
        }
    }

    /// The bytes behind this id. `Ok(None)` if the source no longer has them.
    pub fn resolve(&self) -> StoreResult<Option<Bytes>> {
        let source = match &self.origin {
            Origin::Pretouched(data) => return Ok(Some(data.clone())),
            Origin::Source(source) => source,
        };
        let cache = source.cache();
        if let Some(hit) = cache.and_then(|c| c.get(&self.id)) {
            return Ok(Some(hit));
        }
        let found = source.get(&self.id)?;
        if let (Some(cache), Some(data)) = (cache, &found) {
            cache.insert(self.id.clone(), data.clone());
        }
        Ok(found)
    }

    /// Like [`resolve`](Self::resolve), failing with
    /// [`StoreError::NotFound`] when the bytes are gone.
    pub fn fetch(&self) -> StoreResult<Bytes> {
        self.resolve()?
            .ok_or_else(|| StoreError::NotFound(self.id.clone()))
    }

    /// Write pretouched content into `repo`, returning a handle bound to it.
    pub fn persist(&self, repo: Arc<dyn Repo>) -> StoreResult<Self> {
        let data = self.fetch()?;
        let id = repo.put(&data)?;
        Ok(Self::from_source(id, repo))
    }
}

impl PartialEq for ResolvableId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResolvableId {}

impl PartialOrd for ResolvableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResolvableId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for ResolvableId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ResolvableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.origin {
            Origin::Source(_) => "source",
            Origin::Pretouched(_) => "pretouched",
        };
        write!(f, "ResolvableId({}, {origin})", self.id.short_hex())
    }
}

impl From<ResolvableId> for ContentId {
    fn from(r: ResolvableId) -> Self {
        r.id
    }
}
