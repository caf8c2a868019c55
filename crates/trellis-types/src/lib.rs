//! Foundation types for Trellis.
//!
//! Every other Trellis crate depends on `trellis-types`. It defines the
//! identifier vocabulary of the store and nothing else: no hashing, no I/O.
//!
//! # Key Types
//!
//! - [`SchemeTag`] -- 64-bit identity of a digest scheme
//! - [`ContentId`] -- digest bytes tagged with the scheme that produced them

pub mod error;
pub mod id;

pub use error::TypeError;
pub use id::{ContentId, SchemeTag};
