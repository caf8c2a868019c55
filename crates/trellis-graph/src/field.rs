use std::fmt;

use trellis_crypto::CidScheme;
use trellis_types::ContentId;

/// The six canonical fields of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeField {
    Subjects,
    Predicates,
    Objects,
    Authors,
    Assumptions,
    Patterns,
}

impl EdgeField {
    pub const ALL: [EdgeField; 6] = [
        EdgeField::Subjects,
        EdgeField::Predicates,
        EdgeField::Objects,
        EdgeField::Authors,
        EdgeField::Assumptions,
        EdgeField::Patterns,
    ];

    /// Symbolic name; its digest is the field's key.
    pub fn name(self) -> &'static str {
        match self {
            EdgeField::Subjects => "SUBJECTS",
            EdgeField::Predicates => "PREDICATES",
            EdgeField::Objects => "OBJECTS",
            EdgeField::Authors => "AUTHORS",
            EdgeField::Assumptions => "ASSUMPTIONS",
            EdgeField::Patterns => "PATTERNS",
        }
    }

    /// The map key of this field under `scheme`.
    pub fn key(self, scheme: &dyn CidScheme) -> ContentId {
        scheme.key_for(self.name().as_bytes())
    }

    /// The canonical field whose key is `key`, if any.
    pub fn from_key(scheme: &dyn CidScheme, key: &ContentId) -> Option<EdgeField> {
        Self::ALL.into_iter().find(|f| f.key(scheme) == *key)
    }

    /// Position in [`EdgeField::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EdgeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_crypto::default_scheme;

    #[test]
    fn keys_are_name_digests() {
        let scheme = default_scheme();
        assert_eq!(
            EdgeField::Subjects.key(scheme.as_ref()),
            scheme.key_for(b"SUBJECTS")
        );
    }

    #[test]
    fn from_key_roundtrips() {
        let scheme = default_scheme();
        for field in EdgeField::ALL {
            assert_eq!(
                EdgeField::from_key(scheme.as_ref(), &field.key(scheme.as_ref())),
                Some(field)
            );
        }
        assert_eq!(
            EdgeField::from_key(scheme.as_ref(), &scheme.key_for(b"SIGNATURES")),
            None
        );
    }

    #[test]
    fn index_matches_position() {
        for (i, field) in EdgeField::ALL.into_iter().enumerate() {
            assert_eq!(field.index(), i);
        }
    }
}
