use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Identity of a digest scheme.
///
/// Two schemes are interchangeable exactly when their tags are equal. The tag
/// travels with every [`ContentId`] and heads every framed stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemeTag(u64);

impl SchemeTag {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian encoding, as written at the head of a stream.
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Debug for SchemeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemeTag({:016x})", self.0)
    }
}

impl fmt::Display for SchemeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Content-addressed identifier.
///
/// A `ContentId` is the digest of some bytes under a particular scheme. The
/// digest is held in a shared buffer, so clones are cheap. Ids order by
/// unsigned byte comparison of the digest; the scheme tag only breaks ties
/// between ids of different schemes, which never meet inside one structure.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId {
    bytes: Arc<[u8]>,
    scheme: SchemeTag,
}

impl ContentId {
    /// Wrap digest bytes produced by `scheme`.
    ///
    /// No length check is made here; schemes validate lengths before handing
    /// out ids (see `CidScheme::id_from_bytes`).
    pub fn new(scheme: SchemeTag, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            scheme,
        }
    }

    /// Wrap digest bytes after checking their length.
    pub fn from_slice(
        scheme: SchemeTag,
        bytes: &[u8],
        key_length: usize,
    ) -> Result<Self, TypeError> {
        if bytes.len() != key_length {
            return Err(TypeError::InvalidLength {
                expected: key_length,
                actual: bytes.len(),
            });
        }
        Ok(Self::new(scheme, bytes))
    }

    pub fn scheme(&self) -> SchemeTag {
        self.scheme
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fails unless this id was produced by the `expected` scheme.
    pub fn ensure_scheme(&self, expected: SchemeTag) -> Result<(), TypeError> {
        if self.scheme != expected {
            return Err(TypeError::SchemeMismatch {
                expected,
                actual: self.scheme,
            });
        }
        Ok(())
    }

    /// Hex-encoded digest.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.bytes[..self.bytes.len().min(4)])
    }

    /// Parse a hex digest belonging to `scheme`.
    pub fn from_hex(scheme: SchemeTag, s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.is_empty() {
            return Err(TypeError::InvalidLength {
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self::new(scheme, bytes))
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short_hex())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ContentId {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Textual form: `<scheme tag hex>:<digest hex>`.
impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, digest) = s
            .split_once(':')
            .ok_or_else(|| TypeError::InvalidFormat(s.to_string()))?;
        let tag = u64::from_str_radix(tag, 16)
            .map_err(|_| TypeError::InvalidFormat(format!("bad scheme tag {tag:?}")))?;
        Self::from_hex(SchemeTag::new(tag), digest)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}:{}", self.scheme, self.to_hex()))
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TAG: SchemeTag = SchemeTag::new(0x5348_4135_3132);
    const OTHER: SchemeTag = SchemeTag::new(0xb1a4_e300);

    fn id(bytes: &[u8]) -> ContentId {
        ContentId::new(TAG, bytes)
    }

    #[test]
    fn equality_requires_matching_scheme() {
        let a = ContentId::new(TAG, [7u8; 4].as_slice());
        let b = ContentId::new(OTHER, [7u8; 4].as_slice());
        assert_ne!(a, b);
        assert_eq!(a, id(&[7, 7, 7, 7]));
    }

    #[test]
    fn ordering_is_unsigned() {
        assert!(id(&[0x01]) < id(&[0x80]));
        assert!(id(&[0x7f, 0xff]) < id(&[0x80, 0x00]));
        assert!(id(&[0xff]) > id(&[0x00]));
    }

    #[test]
    fn from_slice_checks_length() {
        let err = ContentId::from_slice(TAG, &[1, 2, 3], 4).unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 4,
                actual: 3
            }
        );
        assert!(ContentId::from_slice(TAG, &[1, 2, 3, 4], 4).is_ok());
    }

    #[test]
    fn ensure_scheme_reports_both_tags() {
        let a = id(&[1, 2]);
        assert!(a.ensure_scheme(TAG).is_ok());
        assert_eq!(
            a.ensure_scheme(OTHER),
            Err(TypeError::SchemeMismatch {
                expected: OTHER,
                actual: TAG
            })
        );
    }

    #[test]
    fn hex_roundtrip() {
        let a = id(&[0xde, 0xad, 0xbe, 0xef, 0x01]);
        assert_eq!(a.to_hex(), "deadbeef01");
        assert_eq!(a.short_hex(), "deadbeef");
        assert_eq!(ContentId::from_hex(TAG, &a.to_hex()).unwrap(), a);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            ContentId::from_hex(TAG, "zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn display_and_parse() {
        let a = id(&[0xab; 8]);
        let text = format!("{}:{a}", a.scheme());
        let parsed: ContentId = text.parse().unwrap();
        assert_eq!(parsed, a);
        assert!(matches!(
            "no-colon".parse::<ContentId>(),
            Err(TypeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn serde_roundtrip() {
        let a = id(&[9; 16]);
        let json = serde_json::to_string(&a).unwrap();
        let parsed: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(a, parsed);
        assert_eq!(parsed.scheme(), TAG);
    }

    #[test]
    fn scheme_tag_big_endian() {
        let tag = SchemeTag::new(0x0102_0304_0506_0708);
        assert_eq!(tag.to_be_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(SchemeTag::from_be_bytes(tag.to_be_bytes()), tag);
        assert_eq!(tag.to_string(), "0102030405060708");
    }

    proptest! {
        #[test]
        fn ordering_matches_byte_order(
            a in proptest::collection::vec(any::<u8>(), 8),
            b in proptest::collection::vec(any::<u8>(), 8),
        ) {
            prop_assert_eq!(id(&a).cmp(&id(&b)), a.cmp(&b));
        }
    }
}
