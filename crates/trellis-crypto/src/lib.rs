//! Digest schemes for Trellis.
//!
//! A scheme turns bytes into a [`ContentId`]. Identical bytes always produce
//! the same id under one scheme, and ids from different schemes never compare
//! equal. All crypto operations wrap established libraries.
//!
//! - [`Sha512Scheme`] -- the default, 64-byte SHA-512 digests
//! - [`Blake3Scheme`] -- 32-byte BLAKE3 digests
//! - [`SchemeRegistry`] -- resolves a [`SchemeTag`] read off the wire

pub mod blake;
pub mod registry;
pub mod scheme;
pub mod sha512;

pub use blake::Blake3Scheme;
pub use registry::SchemeRegistry;
pub use scheme::{default_scheme, CidScheme, SchemeRef};
pub use sha512::Sha512Scheme;

pub use trellis_types::{ContentId, SchemeTag, TypeError};
