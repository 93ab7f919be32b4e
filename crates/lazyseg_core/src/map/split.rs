//! Segment-aligned split traversal for maps.

use super::{LazyMap, MapEntry};
use crate::error::{CoreError, CoreResult};
use crate::persistence::PayloadStore;
use crate::types::SegmentId;
use std::fmt;
use std::hash::{BuildHasher, Hash};

/// Detached, splittable traversal over entry ordinals of a map.
///
/// Maps have no offsets, so ordinals are translated with
/// [`LazyMap::position_of`]. Otherwise this behaves like the sequence
/// splitter: a late-bound upper bound, splits snapped to segment boundaries,
/// and a pin on the segment being read.
pub struct MapSplitter<K, V, R> {
    project: fn(&MapEntry<K, V>) -> R,
    index: usize,
    fence: Option<usize>,
    expected: u64,
    pinned: Option<SegmentId>,
}

impl<K, V, R> MapSplitter<K, V, R> {
    pub(super) fn new(project: fn(&MapEntry<K, V>) -> R) -> Self {
        Self {
            project,
            index: 0,
            fence: None,
            expected: 0,
            pinned: None,
        }
    }

    /// Returns how many entries remain.
    #[must_use]
    pub fn estimate_size<S, H>(&self, map: &LazyMap<K, V, S, H>) -> usize {
        self.fence
            .unwrap_or(map.len)
            .saturating_sub(self.index)
    }

    /// Passes the next projection to `action`. Returns `false` once
    /// exhausted. A failed step releases the pin.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the map changed since this
    /// traversal bound, or the error of paging a segment in.
    pub fn try_advance<S, H, F>(&mut self, map: &mut LazyMap<K, V, S, H>, action: F) -> CoreResult<bool>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
        F: FnOnce(R),
    {
        let advanced = self.advance(map, action);
        if advanced.is_err() {
            self.release(map);
        }
        advanced
    }

    fn advance<S, H, F>(&mut self, map: &mut LazyMap<K, V, S, H>, action: F) -> CoreResult<bool>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
        F: FnOnce(R),
    {
        let fence = self.bind(map)?;
        if self.index >= fence {
            self.release(map);
            return Ok(false);
        }

        let position = map.position_of(self.index)?;
        self.hold(map, position.segment_index);
        let local = position.local_index;
        let item = map
            .table
            .page_in(position.segment_index)?
            .get(local)
            .map(self.project)
            .ok_or_else(|| {
                CoreError::corrupt_index(format!("segment payload does not hold position {local}"))
            })?;
        action(item);
        self.index += 1;
        Ok(true)
    }

    /// Passes every remaining projection to `action`, one segment at a time.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the map changed since this
    /// traversal bound, or the error of paging a segment in.
    pub fn for_each_remaining<S, H, F>(
        &mut self,
        map: &mut LazyMap<K, V, S, H>,
        mut action: F,
    ) -> CoreResult<()>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
        F: FnMut(R),
    {
        let fence = self.bind(map)?;
        self.release(map);
        while self.index < fence {
            let position = map.position_of(self.index)?;
            let end = (position.segment_start + position.segment_len).min(fence);
            let window = position.local_index..end - position.segment_start;
            let items = map.table.page_in(position.segment_index)?;
            let slice = items.get(window).ok_or_else(|| {
                CoreError::corrupt_index(format!(
                    "segment {} is shorter than recorded",
                    position.segment_index
                ))
            })?;
            for entry in slice {
                action((self.project)(entry));
            }
            self.index = end;
        }
        Ok(())
    }

    /// Hands the first part of the remaining ordinals to a new splitter and
    /// keeps the rest. Returns `None` when the range lies within one
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the map changed since this
    /// traversal bound.
    pub fn try_split<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>) -> CoreResult<Option<Self>>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        let hi = self.bind(map)?;
        let lo = self.index;
        if lo >= hi {
            return Ok(None);
        }

        let mid = lo + (hi - lo) / 2;
        let position = map.position_of(mid)?;
        let offset = position.segment_start;
        let end = offset + position.segment_len;
        let mut split = if mid - offset < end - mid { offset } else { end };
        if split <= lo {
            split = end;
        }
        if split >= hi {
            split = offset;
        }
        if split <= lo || split >= hi {
            return Ok(None);
        }

        self.release(map);
        self.index = split;
        Ok(Some(Self {
            project: self.project,
            index: lo,
            fence: Some(split),
            expected: self.expected,
            pinned: None,
        }))
    }

    /// Unpins the segment held by this traversal, if any.
    pub fn release<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>)
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        if let Some(id) = self.pinned.take() {
            map.table.unpin(id);
        }
    }

    /// Binds the fence on first use, then checks the map is unchanged.
    /// A changed map drops the pin before failing.
    fn bind<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>) -> CoreResult<usize>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        match self.fence {
            Some(fence) => {
                if map.generation != self.expected {
                    self.release(map);
                    return Err(CoreError::concurrent_change(self.expected, map.generation));
                }
                Ok(fence)
            }
            None => {
                self.fence = Some(map.len);
                self.expected = map.generation;
                Ok(map.len)
            }
        }
    }

    fn hold<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>, s: usize)
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        let id = map.table.segments[s].id;
        if self.pinned == Some(id) {
            return;
        }
        self.release(map);
        map.table.pin(s);
        self.pinned = Some(id);
    }
}

impl<K, V, R> fmt::Debug for MapSplitter<K, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSplitter")
            .field("index", &self.index)
            .field("fence", &self.fence)
            .field("expected", &self.expected)
            .field("pinned", &self.pinned)
            .finish()
    }
}
