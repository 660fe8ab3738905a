//! Entry codec.
//!
//! Turns an [`Entry`] into a self-contained storage record and back. The
//! record is independent of the storage medium:
//!
//! ```text
//! magic "OCRE"                         4 bytes
//! lifetime  secs u64 LE | nanos u32 LE 12 bytes
//! gracetime secs u64 LE | nanos u32 LE 12 bytes
//! tag length u16 LE | tag (UTF-8)      2 + n bytes
//! payload length u32 LE | payload      4 + m bytes
//! checksum (SHA-256 prefix)            8 bytes
//! ```
//!
//! The payload is the registered type's bincode form. The checksum covers every
//! preceding byte, so torn writes and bit rot surface as [`DecodeError`]
//! rather than as a half-built entry.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::entry::{Entry, Meta};
use crate::error::{DecodeError, EncodeError};
use crate::registry::PayloadRegistry;

const MAGIC: [u8; 4] = *b"OCRE";
const CHECKSUM_LEN: usize = 8;
const DURATION_LEN: usize = 12;
const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Smallest possible record: empty tag and empty payload.
pub const MIN_RECORD_LEN: usize = MAGIC.len() + 2 * DURATION_LEN + 2 + 4 + CHECKSUM_LEN;

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Encodes and decodes entries for one payload registry.
#[derive(Debug, Clone, Default)]
pub struct EntryCodec {
    registry: PayloadRegistry,
}

impl EntryCodec {
    pub fn new(registry: PayloadRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PayloadRegistry {
        &self.registry
    }

    /// Encode `entry` into a storage record. Tags are not written.
    pub fn encode(&self, entry: &Entry) -> Result<Vec<u8>, EncodeError> {
        let payload_type = self
            .registry
            .lookup_type(entry.data.value_type_id())
            .ok_or_else(|| EncodeError::Unregistered {
                type_name: entry.data.type_name().to_string(),
            })?;
        let tag = payload_type.tag();

        let payload = payload_type
            .encode(&entry.data)
            .map_err(|reason| EncodeError::Payload {
                tag: tag.to_string(),
                reason,
            })?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| EncodeError::TooLarge {
            tag: tag.to_string(),
            len: payload.len(),
        })?;
        // Registry guarantees tags fit in u16.
        let tag_len = u16::try_from(tag.len()).map_err(|_| EncodeError::TooLarge {
            tag: tag.to_string(),
            len: tag.len(),
        })?;

        let mut record = Vec::with_capacity(MIN_RECORD_LEN + tag.len() + payload.len());
        record.extend_from_slice(&MAGIC);
        write_duration(&mut record, entry.meta.lifetime);
        write_duration(&mut record, entry.meta.gracetime);
        record.extend_from_slice(&tag_len.to_le_bytes());
        record.extend_from_slice(tag.as_bytes());
        record.extend_from_slice(&payload_len.to_le_bytes());
        record.extend_from_slice(&payload);
        let sum = checksum(&record);
        record.extend_from_slice(&sum);

        Ok(record)
    }

    /// Decode a storage record. Never returns a partially-populated entry.
    pub fn decode(&self, bytes: &[u8]) -> Result<Entry, DecodeError> {
        if bytes.len() < MIN_RECORD_LEN {
            return Err(DecodeError::Truncated {
                needed: MIN_RECORD_LEN,
                available: bytes.len(),
            });
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(DecodeError::BadMagic);
        }

        let (body, sum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if checksum(body).as_slice() != sum {
            return Err(DecodeError::ChecksumMismatch);
        }

        let mut reader = Reader::new(&body[MAGIC.len()..]);
        let lifetime = reader.duration("lifetime")?;
        let gracetime = reader.duration("gracetime")?;

        let tag_len = u16::from_le_bytes(reader.array::<2>()?) as usize;
        let tag =
            std::str::from_utf8(reader.take(tag_len)?).map_err(|_| DecodeError::InvalidTag)?;
        let payload_type = self
            .registry
            .lookup_tag(tag)
            .ok_or_else(|| DecodeError::UnknownType {
                tag: tag.to_string(),
            })?;

        let payload_len = u32::from_le_bytes(reader.array::<4>()?) as usize;
        let payload = reader.take(payload_len)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes {
                count: reader.remaining(),
            });
        }

        let data = payload_type
            .decode(payload)
            .map_err(|reason| DecodeError::Payload {
                tag: tag.to_string(),
                reason,
            })?;

        Ok(Entry::with_meta(data, Meta::new(lifetime, gracetime)))
    }
}

fn write_duration(out: &mut Vec<u8>, duration: Duration) {
    out.extend_from_slice(&duration.as_secs().to_le_bytes());
    out.extend_from_slice(&duration.subsec_nanos().to_le_bytes());
}

/// Bounds-checked cursor over a record body.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                needed: self.pos + len,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn duration(&mut self, field: &'static str) -> Result<Duration, DecodeError> {
        let secs = u64::from_le_bytes(self.array::<8>()?);
        let nanos = u32::from_le_bytes(self.array::<4>()?);
        if nanos >= NANOS_PER_SEC {
            return Err(DecodeError::InvalidDuration { field, nanos });
        }
        Ok(Duration::new(secs, nanos))
    }
}
