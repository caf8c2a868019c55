use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use trellis_crypto::{SchemeRef, SchemeRegistry};
use trellis_store::{Repo, ResolvableId, StoreError, StoreResult};
use trellis_types::ContentId;

use crate::error::{StuffError, StuffResult};
use crate::virtual_repo::LinearVirtualRepo;
use crate::wire::{SyncReader, SyncWriter};

struct Inner {
    arena: LinearVirtualRepo,
    top: ContentId,
}

/// A sealed, self-contained bundle anchored at a top id.
///
/// Clones share the same arena. As a [`Repo`] the bundle is read-only:
/// `put` fails with [`StoreError::ReadOnly`].
#[derive(Clone)]
pub struct Stuffed {
    inner: Arc<Inner>,
}

impl Stuffed {
    /// Seal `arena` as a bundle. `top` must be present in it.
    pub fn new(arena: LinearVirtualRepo, top: ContentId) -> StuffResult<Self> {
        if !arena.contains_key(&top)? {
            return Err(StuffError::Missing(top));
        }
        arena.seal();
        Ok(Self {
            inner: Arc::new(Inner { arena, top }),
        })
    }

    pub fn top_id(&self) -> &ContentId {
        &self.inner.top
    }

    /// The top id, resolving against this bundle.
    pub fn top(&self) -> ResolvableId {
        ResolvableId::from_source(self.inner.top.clone(), self.as_repo())
    }

    /// Bytes of the top item.
    pub fn top_bytes(&self) -> StuffResult<Bytes> {
        Ok(self.fetch(&self.inner.top)?)
    }

    /// This bundle as a shared store handle.
    pub fn as_repo(&self) -> Arc<dyn Repo> {
        Arc::new(self.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.arena.is_empty()
    }

    /// Ids in bundle order; the top comes first.
    pub fn ids(&self) -> Vec<ContentId> {
        self.inner.arena.ids()
    }

    /// Check that every item hashes to its id.
    pub fn verify(&self) -> StuffResult<()> {
        let scheme = self.inner.arena.scheme();
        for (id, data) in self.inner.arena.items() {
            let computed = scheme.key_for(&data);
            if computed != id {
                return Err(StoreError::HashMismatch { id, computed }.into());
            }
        }
        Ok(())
    }

    /// Write the bundle as a framed stream, top item first.
    pub fn write_to<W: Write>(&self, writer: W) -> StuffResult<W> {
        let mut writer = SyncWriter::new(writer, self.inner.arena.scheme())?;
        writer.write_item(&self.top_bytes()?)?;
        for (id, data) in self.inner.arena.items() {
            if id != self.inner.top {
                writer.write_item(&data)?;
            }
        }
        debug!(top = %self.inner.top.short_hex(), items = writer.items(), "bundle written");
        writer.finish()
    }

    /// Read a bundle from a framed stream; the first item is the top.
    pub fn read_from<R: Read>(reader: R, registry: &SchemeRegistry) -> StuffResult<Self> {
        let mut reader = SyncReader::new(reader, registry)?;
        let arena = LinearVirtualRepo::new(reader.scheme().clone());
        let mut top = None;
        while let Some((id, data)) = reader.read_item()? {
            top.get_or_insert_with(|| id.clone());
            arena.append_keyed(id, data)?;
        }
        let top = top.ok_or(StuffError::Empty)?;
        debug!(top = %top.short_hex(), items = arena.len(), "bundle read");
        Self::new(arena, top)
    }

    /// Framed serialization of the bundle.
    pub fn to_bytes(&self) -> StuffResult<Vec<u8>> {
        self.write_to(Vec::new())
    }
}

impl Repo for Stuffed {
    fn scheme(&self) -> SchemeRef {
        self.inner.arena.scheme()
    }

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool> {
        self.inner.arena.contains_key(id)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        self.inner.arena.get(id)
    }

    fn put(&self, _data: &[u8]) -> StoreResult<ContentId> {
        Err(StoreError::ReadOnly)
    }
}

impl std::fmt::Debug for Stuffed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stuffed")
            .field("top", &self.inner.top)
            .field("items", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::default_scheme;

    fn bundle(items: &[&[u8]]) -> Stuffed {
        let arena = LinearVirtualRepo::new(default_scheme());
        let ids: Vec<_> = items.iter().map(|d| arena.put(d).unwrap()).collect();
        Stuffed::new(arena, ids[0].clone()).unwrap()
    }

    #[test]
    fn top_must_be_present() {
        let arena = LinearVirtualRepo::new(default_scheme());
        let absent = arena.key_for(b"absent");
        assert!(matches!(
            Stuffed::new(arena, absent),
            Err(StuffError::Missing(_))
        ));
    }

    #[test]
    fn put_is_read_only() {
        let stuffed = bundle(&[b"top"]);
        assert!(matches!(stuffed.put(b"more"), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn top_resolves_against_bundle() {
        let stuffed = bundle(&[b"top", b"child"]);
        assert_eq!(stuffed.top().fetch().unwrap(), &b"top"[..]);
        assert_eq!(stuffed.len(), 2);
        stuffed.verify().unwrap();
    }

    #[test]
    fn stream_roundtrip_keeps_top_first() {
        let stuffed = bundle(&[b"top", b"a", b"b"]);
        let bytes = stuffed.to_bytes().unwrap();
        let restored =
            Stuffed::read_from(bytes.as_slice(), &SchemeRegistry::with_defaults()).unwrap();
        assert_eq!(restored.top_id(), stuffed.top_id());
        assert_eq!(restored.ids(), stuffed.ids());
        assert_eq!(restored.ids()[0], *stuffed.top_id());
    }

    #[test]
    fn empty_stream_has_no_top() {
        let arena = LinearVirtualRepo::new(default_scheme());
        let bytes = arena.to_bytes().unwrap();
        assert!(matches!(
            Stuffed::read_from(bytes.as_slice(), &SchemeRegistry::with_defaults()),
            Err(StuffError::Empty)
        ));
    }
}
