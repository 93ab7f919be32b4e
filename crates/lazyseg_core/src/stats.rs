//! Segment statistics.
//!
//! Every container owns a [`SegmentStats`] and exposes it through `stats()`.
//!
//! ```rust
//! use lazyseg_core::{Config, LazyList};
//!
//! let mut list = LazyList::with_config(Config::for_list().max_segment_size(2)).unwrap();
//! list.extend([1, 2, 3]).unwrap();
//!
//! let snap = list.stats().snapshot();
//! assert_eq!(snap.segments_created, 2);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing paging and structural activity.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct SegmentStats {
    /// Payloads fetched from the store.
    loads: AtomicU64,
    /// Payloads dropped by the eviction policy.
    evictions: AtomicU64,
    /// Payloads handed to the store by `flush`.
    persists: AtomicU64,
    segments_created: AtomicU64,
    segments_dropped: AtomicU64,
    splits: AtomicU64,
    /// Map splits abandoned because the entries could not be divided.
    degenerate_splits: AtomicU64,
    /// Emptied map segments absorbed by a neighbour.
    merges: AtomicU64,
}

impl SegmentStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist(&self) {
        self.persists.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_dropped(&self) {
        self.segments_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_degenerate_split(&self) {
        self.degenerate_splits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of payload fetches.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Returns the number of evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns the number of persisted payloads.
    pub fn persists(&self) -> u64 {
        self.persists.load(Ordering::Relaxed)
    }

    /// Returns the number of segments created.
    pub fn segments_created(&self) -> u64 {
        self.segments_created.load(Ordering::Relaxed)
    }

    /// Returns the number of segments destroyed.
    pub fn segments_dropped(&self) -> u64 {
        self.segments_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of map segment splits.
    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    /// Returns the number of abandoned map splits.
    pub fn degenerate_splits(&self) -> u64 {
        self.degenerate_splits.load(Ordering::Relaxed)
    }

    /// Returns the number of map segment merges.
    pub fn merges(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            loads: self.loads(),
            evictions: self.evictions(),
            persists: self.persists(),
            segments_created: self.segments_created(),
            segments_dropped: self.segments_dropped(),
            splits: self.splits(),
            degenerate_splits: self.degenerate_splits(),
            merges: self.merges(),
        }
    }
}

/// A point-in-time snapshot of segment statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Payload fetches.
    pub loads: u64,
    /// Evictions.
    pub evictions: u64,
    /// Persisted payloads.
    pub persists: u64,
    /// Segments created.
    pub segments_created: u64,
    /// Segments destroyed.
    pub segments_dropped: u64,
    /// Map segment splits.
    pub splits: u64,
    /// Abandoned map splits.
    pub degenerate_splits: u64,
    /// Map segment merges.
    pub merges: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = SegmentStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = SegmentStats::new();

        stats.record_load();
        stats.record_load();
        stats.record_eviction();
        stats.record_split();
        stats.record_degenerate_split();

        let snap = stats.snapshot();
        assert_eq!(snap.loads, 2);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.splits, 1);
        assert_eq!(snap.degenerate_splits, 1);
        assert_eq!(snap.merges, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(SegmentStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_load();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.loads(), 800);
    }
}
