use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use trellis_types::SchemeTag;

use crate::blake::Blake3Scheme;
use crate::scheme::SchemeRef;
use crate::sha512::Sha512Scheme;

/// Lookup table from [`SchemeTag`] to scheme.
///
/// Readers of framed streams only learn the tag; the registry turns it back
/// into a digest function. Callers own their registry and pass it explicitly.
#[derive(Clone, Default)]
pub struct SchemeRegistry {
    schemes: HashMap<SchemeTag, SchemeRef>,
}

impl SchemeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in scheme.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Sha512Scheme));
        registry.register(Arc::new(Blake3Scheme));
        registry
    }

    /// Add a scheme, returning any previous scheme with the same tag.
    pub fn register(&mut self, scheme: SchemeRef) -> Option<SchemeRef> {
        self.schemes.insert(scheme.tag(), scheme)
    }

    pub fn get(&self, tag: SchemeTag) -> Option<SchemeRef> {
        self.schemes.get(&tag).cloned()
    }

    pub fn contains(&self, tag: SchemeTag) -> bool {
        self.schemes.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.schemes.values().map(|s| s.name()).collect();
        names.sort_unstable();
        f.debug_struct("SchemeRegistry")
            .field("schemes", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_both_schemes() {
        let registry = SchemeRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(Sha512Scheme::TAG).unwrap().name(), "sha512");
        assert_eq!(registry.get(Blake3Scheme::TAG).unwrap().key_length(), 32);
    }

    #[test]
    fn unknown_tag_is_none() {
        let registry = SchemeRegistry::with_defaults();
        assert!(registry.get(SchemeTag::new(42)).is_none());
        assert!(SchemeRegistry::new().is_empty());
    }

    #[test]
    fn register_replaces_same_tag() {
        let mut registry = SchemeRegistry::new();
        assert!(registry.register(Arc::new(Sha512Scheme)).is_none());
        assert!(registry.register(Arc::new(Sha512Scheme)).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(Sha512Scheme::TAG));
    }
}
