use std::fmt;
use std::sync::Arc;

use trellis_types::{ContentId, SchemeTag, TypeError};

use crate::sha512::Sha512Scheme;

/// A content-addressing scheme: a digest function plus its identity.
///
/// Implementations are stateless and must be deterministic. Every component
/// that accepts ids from callers checks them with [`ensure_owns`] first, so
/// ids of different schemes never mix silently.
///
/// [`ensure_owns`]: CidScheme::ensure_owns
pub trait CidScheme: Send + Sync + fmt::Debug {
    /// Identity of the scheme. Equal tags mean interchangeable schemes.
    fn tag(&self) -> SchemeTag;

    /// Human-readable name, used in logs.
    fn name(&self) -> &'static str;

    /// Digest size in bytes.
    fn key_length(&self) -> usize;

    /// Hash `data`. Pure.
    fn digest(&self, data: &[u8]) -> Vec<u8>;

    /// The content id of `data`.
    fn key_for(&self, data: &[u8]) -> ContentId {
        ContentId::new(self.tag(), self.digest(data))
    }

    /// Build an id from raw digest bytes, checking their length.
    fn id_from_bytes(&self, bytes: &[u8]) -> Result<ContentId, TypeError> {
        ContentId::from_slice(self.tag(), bytes, self.key_length())
    }

    /// Fails unless `id` was produced by this scheme.
    fn ensure_owns(&self, id: &ContentId) -> Result<(), TypeError> {
        id.ensure_scheme(self.tag())?;
        if id.len() != self.key_length() {
            return Err(TypeError::InvalidLength {
                expected: self.key_length(),
                actual: id.len(),
            });
        }
        Ok(())
    }

    fn is_compatible(&self, other: &dyn CidScheme) -> bool {
        self.tag() == other.tag()
    }

    /// Whether `data` hashes to `id` under this scheme.
    fn verify(&self, data: &[u8], id: &ContentId) -> bool {
        id.scheme() == self.tag() && self.digest(data) == id.as_bytes()
    }
}

/// Shared handle to a scheme.
pub type SchemeRef = Arc<dyn CidScheme>;

/// The scheme used when the caller has no preference: SHA-512.
pub fn default_scheme() -> SchemeRef {
    Arc::new(Sha512Scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blake::Blake3Scheme;

    #[test]
    fn default_is_sha512() {
        let scheme = default_scheme();
        assert_eq!(scheme.tag(), Sha512Scheme::TAG);
        assert_eq!(scheme.key_length(), 64);
    }

    #[test]
    fn ensure_owns_rejects_foreign_ids() {
        let sha = Sha512Scheme;
        let blake = Blake3Scheme;
        let foreign = blake.key_for(b"x");
        assert!(matches!(
            sha.ensure_owns(&foreign),
            Err(TypeError::SchemeMismatch { .. })
        ));
        assert!(sha.ensure_owns(&sha.key_for(b"x")).is_ok());
    }

    #[test]
    fn ensure_owns_rejects_wrong_length() {
        let sha = Sha512Scheme;
        let short = ContentId::new(Sha512Scheme::TAG, vec![0u8; 12]);
        assert_eq!(
            sha.ensure_owns(&short),
            Err(TypeError::InvalidLength {
                expected: 64,
                actual: 12
            })
        );
    }

    #[test]
    fn compatibility_is_tag_equality() {
        assert!(Sha512Scheme.is_compatible(&Sha512Scheme));
        assert!(!Sha512Scheme.is_compatible(&Blake3Scheme));
    }

    #[test]
    fn verify_checks_content() {
        let sha = Sha512Scheme;
        let id = sha.key_for(b"payload");
        assert!(sha.verify(b"payload", &id));
        assert!(!sha.verify(b"tampered", &id));
        assert!(!Blake3Scheme.verify(b"payload", &id));
    }
}
