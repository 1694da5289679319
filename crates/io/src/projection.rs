//! Opaque versioned projection blobs.
//!
//! Layout: 4-byte magic, little-endian u16 format version, bincode payload,
//! 32-byte blake3 checksum of the payload. Decoding rejects anything it does
//! not recognize — wrong magic, unknown version, truncation, checksum
//! mismatch, malformed payload — rather than misinterpreting it.
//!
//! Equal document states encode to identical bytes: the state's tile map is
//! ordered, and bincode is deterministic over it. Checkpoint byte-equality
//! comparisons rely on this.

use landforge_engine::document::DocumentState;

use crate::error::StoreError;

pub const MAGIC: [u8; 4] = *b"LFPJ";
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;
const CHECKSUM_LEN: usize = 32;

/// Encode a document state into a self-validating blob.
pub fn encode(state: &DocumentState) -> Result<Vec<u8>, StoreError> {
    let payload =
        bincode::serialize(state).map_err(|e| StoreError::Backend(format!("encode: {e}")))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(blake3::hash(&payload).as_bytes());
    Ok(out)
}

/// Decode and validate a projection blob.
pub fn decode(bytes: &[u8]) -> Result<DocumentState, StoreError> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(StoreError::Corrupt("truncated blob".into()));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(StoreError::Corrupt("bad magic".into()));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(StoreError::Corrupt(format!("unknown format version {version}")));
    }

    let (payload, checksum) = bytes[HEADER_LEN..].split_at(bytes.len() - HEADER_LEN - CHECKSUM_LEN);
    if blake3::hash(payload).as_bytes() != checksum {
        return Err(StoreError::Corrupt("checksum mismatch".into()));
    }

    bincode::deserialize(payload).map_err(|e| StoreError::Corrupt(format!("payload: {e}")))
}
