//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and the frame codec
//! that turns them into bytes.

use bincode::Options;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalError};

// =============================================================================
// Format Constants
// =============================================================================

/// Current entry encoding version
pub const ENTRY_VERSION: u8 = 1;

/// Size of the little-endian `i32` length prefix in front of every entry
pub const FRAME_HEADER_SIZE: usize = 4;

/// Fixed part of an encoded entry:
/// Version (1) + Sequence (8) + PayloadLen (8) + Checksum (4) = 21 bytes
pub const ENTRY_OVERHEAD: usize = 1 + 8 + 8 + 4;

/// Largest encoded entry a frame may carry (64 MB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// bincode settings for entries: fixed-width little-endian integers and no
/// trailing garbage, so an encoding is deterministic and its length is known
/// up front.
fn entry_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

// =============================================================================
// Checksum
// =============================================================================

/// CRC-32 (IEEE) over `payload` followed by the low byte of the sequence number.
///
/// This construction is part of the on-disk format.
pub fn checksum(payload: &[u8], sequence_number: u64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.update(&[sequence_number as u8]);
    hasher.finalize()
}

// =============================================================================
// Entry
// =============================================================================

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Encoding version, checked on decode
    pub version: u8,

    /// Monotonically increasing, assigned by the WAL under its lock
    pub sequence_number: u64,

    /// Opaque caller bytes
    pub payload: Vec<u8>,

    /// See [`checksum`]
    pub checksum: u32,
}

impl Entry {
    /// Build an entry and compute its checksum
    pub fn new(sequence_number: u64, payload: Vec<u8>) -> Self {
        let checksum = checksum(&payload, sequence_number);
        Self {
            version: ENTRY_VERSION,
            sequence_number,
            payload,
            checksum,
        }
    }

    /// Recompute the checksum and compare it to the stored one
    pub fn verify(&self) -> bool {
        checksum(&self.payload, self.sequence_number) == self.checksum
    }

    /// Serialize the entry body (no length prefix)
    pub fn encode(&self) -> Result<Vec<u8>> {
        entry_codec()
            .serialize(self)
            .map_err(|e| WalError::Encoding(format!("entry {}: {}", self.sequence_number, e)))
    }

    /// Parse an entry body and validate version and checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let entry: Entry = entry_codec()
            .deserialize(bytes)
            .map_err(|e| WalError::Corruption(format!("cannot parse entry: {}", e)))?;

        if entry.version != ENTRY_VERSION {
            return Err(WalError::Corruption(format!(
                "unsupported entry version {} (expected {})",
                entry.version, ENTRY_VERSION
            )));
        }

        let actual = checksum(&entry.payload, entry.sequence_number);
        if actual != entry.checksum {
            return Err(WalError::Integrity {
                sequence_number: entry.sequence_number,
                expected: entry.checksum,
                actual,
            });
        }

        Ok(entry)
    }

    /// Size of the encoded body in bytes
    pub fn encoded_len(&self) -> usize {
        ENTRY_OVERHEAD + self.payload.len()
    }
}

// =============================================================================
// Frames
// =============================================================================

/// On-disk size of a frame carrying a payload of `payload_len` bytes
pub fn frame_len(payload_len: usize) -> u64 {
    (FRAME_HEADER_SIZE + ENTRY_OVERHEAD + payload_len) as u64
}

/// Encode `entry` as `[len: i32 LE][entry bytes]`
pub fn encode_frame(entry: &Entry) -> Result<Bytes> {
    let body = entry.encode()?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(WalError::PayloadTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    frame.put_i32_le(body.len() as i32);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Validate a length prefix read from disk
///
/// Zero, negative and oversized lengths can only come from a torn or
/// corrupted write.
pub fn parse_frame_len(prefix: [u8; FRAME_HEADER_SIZE]) -> Result<usize> {
    let len = i32::from_le_bytes(prefix);
    if len < ENTRY_OVERHEAD as i32 || len as usize > MAX_FRAME_SIZE {
        return Err(WalError::Corruption(format!(
            "invalid frame length {}",
            len
        )));
    }
    Ok(len as usize)
}
