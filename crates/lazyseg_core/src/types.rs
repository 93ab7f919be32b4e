//! Core type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lowest hash value a map segment can own (inclusive).
pub const HASH_MIN: i64 = i32::MIN as i64;

/// Upper end of the hash domain (exclusive). Every `i32` hash lies in
/// `[HASH_MIN, HASH_MAX)`.
pub const HASH_MAX: i64 = 1 << 31;

/// Stable identity of a segment.
///
/// Wraps a random UUID, so segments of different containers sharing one
/// store never collide. The 16 UUID bytes double as the storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(Uuid);

impl SegmentId {
    /// Generates a new random segment ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a segment ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        write!(f, "seg:{}", &simple[..8])
    }
}

/// What an eviction policy may know about a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Residency {
    /// Payload is materialized in memory.
    pub loaded: bool,
    /// Payload was mutated since it was last persisted.
    pub dirty: bool,
    /// At least one traversal has pinned the segment.
    pub pinned: bool,
}

impl Residency {
    /// Returns whether a policy may unload the segment.
    #[must_use]
    pub const fn evictable(self) -> bool {
        self.loaded && !self.dirty && !self.pinned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_domain_covers_every_i32() {
        assert_eq!(HASH_MIN, i64::from(i32::MIN));
        assert_eq!(HASH_MAX, i64::from(i32::MAX) + 1);
    }

    #[test]
    fn segment_id_bytes() {
        let id = SegmentId::from_bytes([7; 16]);
        assert_eq!(id.as_bytes(), &[7; 16]);
        assert_ne!(SegmentId::new(), SegmentId::new());
    }

    #[test]
    fn segment_id_display_is_short() {
        let id = SegmentId::from_bytes([0xAB; 16]);
        assert_eq!(id.to_string(), "seg:abababab");
    }

    #[test]
    fn evictable_requires_loaded_clean_unpinned() {
        let base = Residency {
            loaded: true,
            dirty: false,
            pinned: false,
        };
        assert!(base.evictable());
        assert!(!Residency { dirty: true, ..base }.evictable());
        assert!(!Residency { pinned: true, ..base }.evictable());
        assert!(!Residency { loaded: false, ..base }.evictable());
    }
}
