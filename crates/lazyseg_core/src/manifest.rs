//! Container manifests.
//!
//! A manifest records the segment layout of a flushed container, without
//! any elements. Together with the payload store it is enough to reopen the
//! container with every segment unloaded.

use crate::error::{CoreError, CoreResult};
use crate::types::{SegmentId, HASH_MAX, HASH_MIN};
use lazyseg_codec::{from_cbor, to_cbor};
use serde::{Deserialize, Serialize};

/// One sequence segment in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSegmentEntry {
    /// Segment identity (payload key).
    pub id: SegmentId,
    /// Element count.
    pub len: usize,
}

/// Layout of a flushed [`LazyList`](crate::LazyList).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListManifest {
    /// Segment capacity.
    pub max_segment_size: usize,
    /// Segments in order.
    pub segments: Vec<ListSegmentEntry>,
}

/// One map segment in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSegmentEntry {
    /// Segment identity (payload key).
    pub id: SegmentId,
    /// Lowest owned hash (inclusive).
    pub min_hash: i64,
    /// Upper hash bound (exclusive).
    pub max_hash: i64,
    /// Entry count.
    pub len: usize,
}

/// Layout of a flushed [`LazyMap`](crate::LazyMap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapManifest {
    /// Split target.
    pub max_segment_size: usize,
    /// Fingerprint of the key hasher that placed the entries.
    pub hasher_fingerprint: u64,
    /// Segments in ascending hash order.
    pub segments: Vec<MapSegmentEntry>,
}

fn encode<T: Serialize>(manifest: &T) -> CoreResult<Vec<u8>> {
    to_cbor(manifest).map_err(|e| CoreError::invalid_configuration(format!("manifest: {e}")))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    from_cbor(bytes).map_err(|e| CoreError::invalid_configuration(format!("manifest: {e}")))
}

impl ListManifest {
    /// Total element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(|entry| entry.len).sum()
    }

    /// Returns whether the manifest describes an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Encodes the manifest to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the bytes are not a list manifest.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        decode(bytes)
    }

    /// Checks capacity and segment sizes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` on a zero capacity, an empty segment or
    /// a segment over capacity.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_segment_size == 0 {
            return Err(CoreError::invalid_configuration(
                "list manifest has a zero max_segment_size",
            ));
        }
        for entry in &self.segments {
            if entry.len == 0 || entry.len > self.max_segment_size {
                return Err(CoreError::invalid_configuration(format!(
                    "list manifest segment {} has size {} outside 1..={}",
                    entry.id, entry.len, self.max_segment_size
                )));
            }
        }
        Ok(())
    }
}

impl MapManifest {
    /// Total entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(|entry| entry.len).sum()
    }

    /// Returns whether the manifest describes an empty map.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Encodes the manifest to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the bytes are not a map manifest.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        decode(bytes)
    }

    /// Checks that the segments partition the hash domain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` on a gap, an overlap, an empty range
    /// or an empty segment.
    pub fn validate(&self) -> CoreResult<()> {
        let mut expected_min = HASH_MIN;
        for entry in &self.segments {
            if entry.len == 0 {
                return Err(CoreError::invalid_configuration(format!(
                    "map manifest segment {} is empty",
                    entry.id
                )));
            }
            if entry.min_hash != expected_min || entry.max_hash <= entry.min_hash {
                return Err(CoreError::invalid_configuration(format!(
                    "map manifest segment {} has range [{}, {}), expected to start at {}",
                    entry.id, entry.min_hash, entry.max_hash, expected_min
                )));
            }
            expected_min = entry.max_hash;
        }
        if !self.segments.is_empty() && expected_min != HASH_MAX {
            return Err(CoreError::invalid_configuration(format!(
                "map manifest ends at {expected_min}, not {HASH_MAX}"
            )));
        }
        Ok(())
    }
}
