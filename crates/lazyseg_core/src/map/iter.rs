//! Map traversal.

use super::{LazyMap, MapEntry};
use crate::error::{CoreError, CoreResult};
use crate::persistence::PayloadStore;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;

/// Borrowing iterator over projections of map entries in hash order.
///
/// Stops after the first error.
pub struct Entries<'a, K, V, S, H, R> {
    map: &'a mut LazyMap<K, V, S, H>,
    project: fn(&MapEntry<K, V>) -> R,
    segment: usize,
    local: usize,
    remaining: usize,
}

impl<'a, K, V, S, H, R> Entries<'a, K, V, S, H, R> {
    pub(super) fn new(map: &'a mut LazyMap<K, V, S, H>, project: fn(&MapEntry<K, V>) -> R) -> Self {
        let remaining = map.len;
        Self {
            map,
            project,
            segment: 0,
            local: 0,
            remaining,
        }
    }
}

impl<K, V, S, H, R> Iterator for Entries<'_, K, V, S, H, R>
where
    K: Hash + Eq,
    S: PayloadStore<Vec<MapEntry<K, V>>>,
    H: BuildHasher,
{
    type Item = CoreResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while self.segment < self.map.table.count()
            && self.local >= self.map.table.segments[self.segment].len
        {
            self.segment += 1;
            self.local = 0;
        }
        if self.segment >= self.map.table.count() {
            self.remaining = 0;
            return None;
        }

        let project = self.project;
        let local = self.local;
        let item = match self.map.table.page_in(self.segment) {
            Ok(items) => items.get(local).map(project).ok_or_else(|| {
                CoreError::corrupt_index(format!("segment payload does not hold position {local}"))
            }),
            Err(err) => Err(err),
        };
        if item.is_err() {
            self.remaining = 0;
        } else {
            self.local += 1;
            self.remaining -= 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S, H, R> ExactSizeIterator for Entries<'_, K, V, S, H, R>
where
    K: Hash + Eq,
    S: PayloadStore<Vec<MapEntry<K, V>>>,
    H: BuildHasher,
{
}

impl<K, V, S, H, R> FusedIterator for Entries<'_, K, V, S, H, R>
where
    K: Hash + Eq,
    S: PayloadStore<Vec<MapEntry<K, V>>>,
    H: BuildHasher,
{
}

/// Detached cursor over `(segment, position)` that can remove what it last
/// returned.
///
/// The cursor binds to the map's generation on its first step and fails
/// with `ConcurrentStructuralChange` once the map changes by any other
/// means than [`remove`](Self::remove).
pub struct MapCursor<K, V, R> {
    project: fn(&MapEntry<K, V>) -> R,
    segment: usize,
    local: usize,
    last: Option<(usize, usize)>,
    expected: Option<u64>,
}

impl<K, V, R> MapCursor<K, V, R> {
    pub(super) fn new(project: fn(&MapEntry<K, V>) -> R) -> Self {
        Self {
            project,
            segment: 0,
            local: 0,
            last: None,
            expected: None,
        }
    }

    /// Returns the next projection, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Yields `ConcurrentStructuralChange` if the map changed since the
    /// cursor bound, or the error of paging a segment in.
    pub fn next<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>) -> Option<CoreResult<R>>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        if let Err(err) = self.check(map) {
            return Some(Err(err));
        }
        if self.expected.is_none() {
            self.expected = Some(map.generation());
        }

        loop {
            let len = map.table.segments.get(self.segment)?.len;
            if self.local < len {
                break;
            }
            self.segment += 1;
            self.local = 0;
        }

        let (s, local) = (self.segment, self.local);
        let item = match map.table.page_in(s) {
            Ok(items) => items.get(local).map(self.project),
            Err(err) => return Some(Err(err)),
        };
        self.local += 1;
        self.last = Some((s, local));
        Some(item.ok_or_else(|| {
            CoreError::corrupt_index(format!("segment {s} does not hold position {local}"))
        }))
    }

    /// Removes the entry most recently returned by [`next`](Self::next). A
    /// segment left empty is merged into a neighbour.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if there is no such entry,
    /// `ConcurrentStructuralChange` if the map changed behind the cursor, or
    /// the removal's own error.
    pub fn remove<S, H>(&mut self, map: &mut LazyMap<K, V, S, H>) -> CoreResult<(K, V)>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        self.check(map)?;
        let (s, i) = self.last.take().ok_or_else(|| {
            CoreError::invalid_operation("remove called without a preceding entry")
        })?;

        let before = map.segment_count();
        let entry = map.remove_entry_at(s, i)?;
        if map.segment_count() < before {
            if self.segment > s {
                self.segment -= 1;
            } else if self.segment == s {
                self.local = 0;
            }
        } else if self.segment == s {
            self.local -= 1;
        }
        self.expected = Some(map.generation());
        Ok(entry.into_pair())
    }

    fn check<S, H>(&self, map: &LazyMap<K, V, S, H>) -> CoreResult<()>
    where
        K: Hash + Eq,
        S: PayloadStore<Vec<MapEntry<K, V>>>,
        H: BuildHasher,
    {
        match self.expected {
            Some(expected) if expected != map.generation() => {
                Err(CoreError::concurrent_change(expected, map.generation()))
            }
            _ => Ok(()),
        }
    }
}

impl<K, V, R> std::fmt::Debug for MapCursor<K, V, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCursor")
            .field("segment", &self.segment)
            .field("local", &self.local)
            .field("last", &self.last)
            .field("expected", &self.expected)
            .finish()
    }
}
