//! Value codec for stored records.
//!
//! Every record is serialized with:
//! - JSON for data (compatible with existing serde attributes)
//! - Length-prefixed format for framing
//! - CRC32 checksum for corruption detection
//! - Version byte for forward compatibility

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

use super::traits::StorageError;

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Reject unreasonably large values (100 MB max).
const MAX_ENTRY_SIZE: usize = 100 * 1024 * 1024;

const HEADER_LEN: usize = 1 + 4;
const TRAILER_LEN: usize = 4;

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes a value to bytes with checksum.
///
/// Format:
/// ```text
/// [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
/// ```
///
/// # Errors
/// `StorageError::Codec` if serialization fails or the value is too large.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let data = serde_json::to_vec(value)
        .map_err(|e| StorageError::Codec(format!("serialization failed: {e}")))?;
    if data.len() > MAX_ENTRY_SIZE {
        return Err(StorageError::Codec(format!(
            "entry size {} exceeds maximum {MAX_ENTRY_SIZE}",
            data.len()
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    let len = data.len() as u32;
    let crc = checksum(&data);

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + TRAILER_LEN);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Deserializes a value from bytes, verifying checksum.
///
/// # Errors
/// - Returns error if checksum fails (corruption detected)
/// - Returns error if version is unsupported
/// - Returns error if deserialization fails
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(StorageError::Codec(format!(
            "value too short: {} bytes",
            bytes.len()
        )));
    }

    if bytes[0] != CODEC_VERSION {
        return Err(StorageError::Codec(format!(
            "unsupported codec version: {} (expected {CODEC_VERSION})",
            bytes[0]
        )));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[1..HEADER_LEN]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_ENTRY_SIZE {
        return Err(StorageError::Codec(format!(
            "entry size {len} exceeds maximum {MAX_ENTRY_SIZE}"
        )));
    }
    if bytes.len() != HEADER_LEN + len + TRAILER_LEN {
        return Err(StorageError::Codec(format!(
            "length mismatch: header says {len}, value holds {}",
            bytes.len() - HEADER_LEN - TRAILER_LEN
        )));
    }

    let data = &bytes[HEADER_LEN..HEADER_LEN + len];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[HEADER_LEN + len..]);
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let computed_crc = checksum(data);
    if stored_crc != computed_crc {
        return Err(StorageError::Codec(format!(
            "CRC mismatch: stored={stored_crc:08x}, computed={computed_crc:08x} (data corrupted)"
        )));
    }

    serde_json::from_slice(data)
        .map_err(|e| StorageError::Codec(format!("deserialization failed: {e}")))
}
