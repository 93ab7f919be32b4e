//! Blob record framing for the file store.
//!
//! ```text
//! | record_len (4) | key (16) | flags (1) | payload (N) | crc32 (4) |
//! ```
//!
//! `record_len` counts the whole record including itself and the checksum.

use crate::error::{StorageError, StorageResult};
use crate::store::BlobKey;

/// Flags for blob records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobRecordFlags(u8);

impl BlobRecordFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Record removes the blob stored under its key.
    pub const TOMBSTONE: Self = Self(0x01);

    /// Creates new flags from raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Checks if tombstone flag is set.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// One framed record of the blob log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// Key the blob is stored under.
    pub key: BlobKey,
    /// Record flags.
    pub flags: BlobRecordFlags,
    /// Blob bytes (empty for tombstones).
    pub payload: Vec<u8>,
}

impl BlobRecord {
    /// Header size: record_len (4) + key (16) + flags (1).
    pub const HEADER_SIZE: usize = 21;
    /// CRC size.
    pub const CRC_SIZE: usize = 4;

    /// Creates a record storing `payload` under `key`.
    #[must_use]
    pub fn put(key: BlobKey, payload: Vec<u8>) -> Self {
        Self {
            key,
            flags: BlobRecordFlags::NONE,
            payload,
        }
    }

    /// Creates a tombstone for `key`.
    #[must_use]
    pub fn tombstone(key: BlobKey) -> Self {
        Self {
            key,
            flags: BlobRecordFlags::TOMBSTONE,
            payload: Vec::new(),
        }
    }

    /// Returns whether this is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.flags.is_tombstone()
    }

    /// Returns the encoded size of this record.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CRC_SIZE
    }

    /// Encodes the record to bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Vec<u8> {
        let record_len = self.encoded_size();
        let mut buf = Vec::with_capacity(record_len);

        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.push(self.flags.as_byte());
        buf.extend_from_slice(&self.payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Reads the `record_len` prefix of an encoded record.
    pub fn peek_len(data: &[u8]) -> Option<usize> {
        let prefix: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(prefix) as usize)
    }

    /// Decodes a record from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is truncated, malformed or fails its
    /// checksum.
    pub fn decode(data: &[u8]) -> StorageResult<Self> {
        if data.len() < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(StorageError::corrupted("record too short"));
        }

        let record_len = Self::peek_len(data).unwrap_or_default();
        if record_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(StorageError::corrupted("record length below header size"));
        }
        if data.len() < record_len {
            return Err(StorageError::corrupted("incomplete record"));
        }

        let crc_at = record_len - Self::CRC_SIZE;
        let stored_crc = u32::from_le_bytes([
            data[crc_at],
            data[crc_at + 1],
            data[crc_at + 2],
            data[crc_at + 3],
        ]);
        let computed_crc = compute_crc32(&data[..crc_at]);
        if stored_crc != computed_crc {
            return Err(StorageError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let key: BlobKey = data[4..20]
            .try_into()
            .map_err(|_| StorageError::corrupted("invalid blob key"))?;
        let flags = BlobRecordFlags::from_byte(data[20]);
        let payload = data[Self::HEADER_SIZE..crc_at].to_vec();

        Ok(Self {
            key,
            flags,
            payload,
        })
    }
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
