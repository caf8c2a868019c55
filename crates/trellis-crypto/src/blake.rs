use trellis_types::SchemeTag;

use crate::scheme::CidScheme;

/// BLAKE3 content addressing with 32-byte keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Blake3Scheme;

impl Blake3Scheme {
    /// `"blake3"` in ASCII, zero padded.
    pub const TAG: SchemeTag = SchemeTag::new(0x626c_616b_6533_0000);
    pub const KEY_LENGTH: usize = 32;
}

impl CidScheme for Blake3Scheme {
    fn tag(&self) -> SchemeTag {
        Self::TAG
    }

    fn name(&self) -> &'static str {
        "blake3"
    }

    fn key_length(&self) -> usize {
        Self::KEY_LENGTH
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        blake3::hash(data).as_bytes().to_vec()
    }
}
