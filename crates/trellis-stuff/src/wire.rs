//! Id-checked stream framing.
//!
//! A stream opens with a length-prefixed scheme tag. Every item after it is
//! a big-endian `u32` payload length, the payload, and the payload's id. The
//! reader recomputes each id and stops at the first mismatch: content is
//! never trusted on the sender's word.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;
use tracing::warn;
use trellis_crypto::{SchemeRef, SchemeRegistry};
use trellis_types::{ContentId, SchemeTag};

use crate::error::{StuffError, StuffResult};

/// Largest payload a single item may carry (64 MiB).
pub const MAX_ITEM_SIZE: usize = 64 * 1024 * 1024;

const TAG_LEN: u8 = 8;

/// Writes framed items to an underlying writer.
pub struct SyncWriter<W: Write> {
    inner: W,
    scheme: SchemeRef,
    items: usize,
}

impl<W: Write> SyncWriter<W> {
    /// Start a stream, writing the scheme header immediately.
    pub fn new(mut inner: W, scheme: SchemeRef) -> StuffResult<Self> {
        inner.write_all(&[TAG_LEN])?;
        inner.write_all(&scheme.tag().to_be_bytes())?;
        Ok(Self {
            inner,
            scheme,
            items: 0,
        })
    }

    /// Append one item, returning its id.
    pub fn write_item(&mut self, data: &[u8]) -> StuffResult<ContentId> {
        if data.len() > MAX_ITEM_SIZE {
            return Err(StuffError::Framing(format!(
                "item of {} bytes exceeds maximum {MAX_ITEM_SIZE}",
                data.len()
            )));
        }
        let id = self.scheme.key_for(data);
        self.inner.write_all(&(data.len() as u32).to_be_bytes())?;
        self.inner.write_all(data)?;
        self.inner.write_all(id.as_bytes())?;
        self.items += 1;
        Ok(id)
    }

    /// Items written so far.
    pub fn items(&self) -> usize {
        self.items
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> StuffResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads framed items, verifying every id.
///
/// Iteration yields `Err` at most once: after the first error the reader
/// halts and yields `None`.
pub struct SyncReader<R: Read> {
    inner: R,
    scheme: SchemeRef,
    halted: bool,
}

impl<R: Read> SyncReader<R> {
    /// Read the stream header and resolve its scheme through `registry`.
    pub fn new(mut inner: R, registry: &SchemeRegistry) -> StuffResult<Self> {
        let mut len = [0u8; 1];
        read_header(&mut inner, &mut len)?;
        if len[0] != TAG_LEN {
            return Err(StuffError::Framing(format!(
                "scheme header of {} bytes, expected {TAG_LEN}",
                len[0]
            )));
        }
        let mut tag = [0u8; TAG_LEN as usize];
        read_header(&mut inner, &mut tag)?;
        let tag = SchemeTag::from_be_bytes(tag);
        let scheme = registry.get(tag).ok_or(StuffError::UnknownScheme(tag))?;
        Ok(Self {
            inner,
            scheme,
            halted: false,
        })
    }

    /// The scheme declared by the stream header.
    pub fn scheme(&self) -> &SchemeRef {
        &self.scheme
    }

    /// Read the next item. `Ok(None)` at a clean end of stream.
    pub fn read_item(&mut self) -> StuffResult<Option<(ContentId, Bytes)>> {
        if self.halted {
            return Ok(None);
        }
        let result = self.read_item_inner();
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    fn read_item_inner(&mut self) -> StuffResult<Option<(ContentId, Bytes)>> {
        let mut len = [0u8; 4];
        if !read_or_eof(&mut self.inner, &mut len)? {
            self.halted = true;
            return Ok(None);
        }
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_ITEM_SIZE {
            return Err(StuffError::Framing(format!(
                "item of {len} bytes exceeds maximum {MAX_ITEM_SIZE}"
            )));
        }

        let mut payload = vec![0u8; len];
        read_body(&mut self.inner, &mut payload, "payload")?;
        let mut claimed = vec![0u8; self.scheme.key_length()];
        read_body(&mut self.inner, &mut claimed, "id")?;

        let id = self.scheme.key_for(&payload);
        if id.as_bytes() != claimed.as_slice() {
            warn!(
                claimed = %hex_prefix(&claimed),
                computed = %id.short_hex(),
                "stream id mismatch; halting"
            );
            return Err(StuffError::Framing(format!(
                "id mismatch: stream claims {}, content hashes to {}",
                hex_prefix(&claimed),
                id.short_hex()
            )));
        }
        Ok(Some((id, Bytes::from(payload))))
    }
}

impl<R: Read> Iterator for SyncReader<R> {
    type Item = StuffResult<(ContentId, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_item().transpose()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

fn read_header<R: Read>(inner: &mut R, buf: &mut [u8]) -> StuffResult<()> {
    inner.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => StuffError::Framing("truncated stream header".into()),
        _ => StuffError::Io(e),
    })
}

fn read_body<R: Read>(inner: &mut R, buf: &mut [u8], what: &str) -> StuffResult<()> {
    inner.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => StuffError::Framing(format!("truncated item {what}")),
        _ => StuffError::Io(e),
    })
}

/// Fill `buf`, or report a clean end of stream if nothing at all was read.
fn read_or_eof<R: Read>(inner: &mut R, buf: &mut [u8]) -> StuffResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(StuffError::Framing("truncated item length".into())),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trellis_crypto::{default_scheme, Blake3Scheme, CidScheme, Sha512Scheme};

    fn encode(items: &[&[u8]]) -> Vec<u8> {
        let mut writer = SyncWriter::new(Vec::new(), default_scheme()).unwrap();
        for item in items {
            writer.write_item(item).unwrap();
        }
        writer.finish().unwrap()
    }

    fn registry() -> SchemeRegistry {
        SchemeRegistry::with_defaults()
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&[]);
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 8);
        assert_eq!(&bytes[1..], &Sha512Scheme::TAG.to_be_bytes());
    }

    #[test]
    fn item_layout() {
        let bytes = encode(&[b"abc"]);
        let item = &bytes[9..];
        assert_eq!(&item[..4], &[0, 0, 0, 3]);
        assert_eq!(&item[4..7], b"abc");
        assert_eq!(&item[7..], Sha512Scheme.key_for(b"abc").as_bytes());
    }

    #[test]
    fn reads_back_in_order() {
        let bytes = encode(&[b"one", b"two", b""]);
        let reader = SyncReader::new(bytes.as_slice(), &registry()).unwrap();
        assert_eq!(reader.scheme().tag(), Sha512Scheme::TAG);
        let items: Vec<_> = reader.map(|r| r.unwrap().1).collect();
        assert_eq!(items, vec![&b"one"[..], &b"two"[..], &b""[..]]);
    }

    #[test]
    fn blake3_stream_uses_short_ids() {
        let mut writer = SyncWriter::new(Vec::new(), Arc::new(Blake3Scheme)).unwrap();
        writer.write_item(b"x").unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 9 + 4 + 1 + 32);
        let mut reader = SyncReader::new(bytes.as_slice(), &registry()).unwrap();
        let (id, _) = reader.read_item().unwrap().unwrap();
        assert_eq!(id, Blake3Scheme.key_for(b"x"));
    }

    #[test]
    fn id_mismatch_halts() {
        let mut bytes = encode(&[b"good", b"evil", b"after"]);
        // Flip the first payload byte of the second item.
        let second = 9 + (4 + 4 + 64) + 4;
        bytes[second] ^= 0xff;

        let mut reader = SyncReader::new(bytes.as_slice(), &registry()).unwrap();
        assert!(reader.read_item().unwrap().is_some());
        assert!(matches!(reader.read_item(), Err(StuffError::Framing(_))));
        assert!(reader.read_item().unwrap().is_none());
    }

    #[test]
    fn truncated_item_is_framing_error() {
        let bytes = encode(&[b"complete"]);
        let cut = &bytes[..bytes.len() - 10];
        let mut reader = SyncReader::new(cut, &registry()).unwrap();
        assert!(matches!(reader.read_item(), Err(StuffError::Framing(_))));
    }

    #[test]
    fn unknown_scheme_rejected() {
        let mut bytes = encode(&[]);
        bytes[1..9].copy_from_slice(&42u64.to_be_bytes());
        assert!(matches!(
            SyncReader::new(bytes.as_slice(), &registry()),
            Err(StuffError::UnknownScheme(tag)) if tag == SchemeTag::new(42)
        ));
    }

    #[test]
    fn bad_header_length_rejected() {
        let bytes = [4u8, 0, 0, 0, 0];
        assert!(matches!(
            SyncReader::new(&bytes[..], &registry()),
            Err(StuffError::Framing(_))
        ));
        assert!(matches!(
            SyncReader::new(&[0u8; 0][..], &registry()),
            Err(StuffError::Framing(_))
        ));
    }

    #[test]
    fn oversized_length_rejected() {
        let mut bytes = encode(&[]);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut reader = SyncReader::new(bytes.as_slice(), &registry()).unwrap();
        assert!(matches!(reader.read_item(), Err(StuffError::Framing(_))));
    }
}
