use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;
use trellis_types::ContentId;

use crate::error::StoreResult;
use crate::storage::Storage;

/// Filesystem backend with one file per payload.
///
/// Layout: `<root>/<scheme tag>/<first 3 hex chars>/<full hex>`. Writes go
/// to a temporary file in the target directory and are renamed into place,
/// so a reader never observes a partially written payload.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path at which `id` is (or would be) stored.
    pub fn path_for(&self, id: &ContentId) -> PathBuf {
        let hex = id.to_hex();
        let fan = &hex[..hex.len().min(3)];
        self.root
            .join(id.scheme().to_string())
            .join(fan)
            .join(&hex)
    }
}

impl Storage for FsStorage {
    fn get(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        match fs::read(self.path_for(id)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, id: &ContentId, data: Bytes) -> StoreResult<()> {
        let path = self.path_for(id);
        if path.exists() {
            return Ok(());
        }
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(id = %id.short_hex(), bytes = data.len(), "wrote payload file");
        Ok(())
    }

    fn contains_key(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.path_for(id).is_file())
    }

    fn supports_deletion(&self) -> bool {
        true
    }

    fn remove(&self, id: &ContentId) -> StoreResult<bool> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("fs({})", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::{Blake3Scheme, CidScheme, Sha512Scheme};

    #[test]
    fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        let id = Sha512Scheme.key_for(b"on disk");
        storage.put(&id, Bytes::from_static(b"on disk")).unwrap();

        assert!(storage.contains_key(&id).unwrap());
        assert_eq!(storage.get(&id).unwrap().unwrap(), &b"on disk"[..]);
    }

    #[test]
    fn layout_fans_out_by_scheme_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        let id = Blake3Scheme.key_for(b"layout");
        let hex = id.to_hex();
        let expected = dir
            .path()
            .join(Blake3Scheme::TAG.to_string())
            .join(&hex[..3])
            .join(&hex);
        assert_eq!(storage.path_for(&id), expected);

        storage.put(&id, Bytes::from_static(b"layout")).unwrap();
        assert!(expected.is_file());
    }

    #[test]
    fn missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        let id = Sha512Scheme.key_for(b"absent");
        assert!(storage.get(&id).unwrap().is_none());
        assert!(!storage.contains_key(&id).unwrap());
        assert!(!storage.remove(&id).unwrap());
    }

    #[test]
    fn second_put_keeps_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        let id = Sha512Scheme.key_for(b"once");
        storage.put(&id, Bytes::from_static(b"once")).unwrap();
        storage.put(&id, Bytes::from_static(b"once")).unwrap();
        assert_eq!(storage.get(&id).unwrap().unwrap(), &b"once"[..]);
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::open(dir.path()).unwrap();
        let id = Sha512Scheme.key_for(b"bye");
        storage.put(&id, Bytes::from_static(b"bye")).unwrap();
        assert!(storage.remove(&id).unwrap());
        assert!(!storage.path_for(&id).exists());
    }
}
