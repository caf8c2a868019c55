use std::slice::ChunksExact;

use bytes::Bytes;
use trellis_crypto::CidScheme;
use trellis_store::Repo;
use trellis_types::{ContentId, TypeError};

use crate::error::{DatumError, DatumResult};

/// Split `bytes` into fixed-size records.
pub(crate) fn records<'a>(
    what: &'static str,
    bytes: &'a [u8],
    record: usize,
) -> DatumResult<ChunksExact<'a, u8>> {
    if record == 0 || bytes.len() % record != 0 {
        return Err(DatumError::Corrupt {
            what,
            len: bytes.len(),
            record,
        });
    }
    Ok(bytes.chunks_exact(record))
}

/// Fails unless `repo` stores ids of `scheme`.
pub(crate) fn ensure_repo(scheme: &dyn CidScheme, repo: &dyn Repo) -> Result<(), TypeError> {
    let actual = repo.scheme().tag();
    if actual != scheme.tag() {
        return Err(TypeError::SchemeMismatch {
            expected: scheme.tag(),
            actual,
        });
    }
    Ok(())
}

/// Fetch a payload that must exist.
pub(crate) fn fetch(repo: &dyn Repo, id: &ContentId) -> DatumResult<Bytes> {
    repo.get(id)?
        .ok_or_else(|| DatumError::Missing(id.clone()))
}
