use sha2::{Digest, Sha512};

use trellis_types::SchemeTag;

use crate::scheme::CidScheme;

/// SHA-512 content addressing with 64-byte keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sha512Scheme;

impl Sha512Scheme {
    /// `"sha512"` in ASCII, zero padded.
    pub const TAG: SchemeTag = SchemeTag::new(0x7368_6135_3132_0000);
    pub const KEY_LENGTH: usize = 64;
}

impl CidScheme for Sha512Scheme {
    fn tag(&self) -> SchemeTag {
        Self::TAG
    }

    fn name(&self) -> &'static str {
        "sha512"
    }

    fn key_length(&self) -> usize {
        Self::KEY_LENGTH
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        Sha512::digest(data).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::RngCore;
    use std::collections::HashSet;

    #[test]
    fn known_vector() {
        let id = Sha512Scheme.key_for(b"abc");
        assert_eq!(
            id.to_hex(),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn key_length_matches_digest() {
        assert_eq!(Sha512Scheme.digest(b"").len(), Sha512Scheme::KEY_LENGTH);
        assert_eq!(Sha512Scheme.key_for(b"").scheme(), Sha512Scheme::TAG);
    }

    #[test]
    fn no_collisions_across_random_inputs() {
        let mut rng = rand::thread_rng();
        let mut inputs = HashSet::new();
        let mut ids = HashSet::new();
        for _ in 0..2_000 {
            let mut buf = vec![0u8; 24];
            rng.fill_bytes(&mut buf);
            if inputs.insert(buf.clone()) {
                assert!(ids.insert(Sha512Scheme.key_for(&buf)));
            }
        }
    }

    proptest! {
        #[test]
        fn key_for_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(Sha512Scheme.key_for(&data), Sha512Scheme.key_for(&data));
        }

        #[test]
        fn distinct_inputs_distinct_ids(
            a in proptest::collection::vec(any::<u8>(), 0..64),
            b in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(Sha512Scheme.key_for(&a), Sha512Scheme.key_for(&b));
        }
    }
}
