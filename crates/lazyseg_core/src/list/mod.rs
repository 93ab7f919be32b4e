//! Segmented, lazily-paged sequence.
//!
//! A [`LazyList`] splits its elements into segments of at most
//! `max_segment_size` elements. Segments form a gapless partition of
//! `0..len` in offset order; each segment's payload is paged in on access
//! and paged out when the eviction policy decides so.
//!
//! ```rust
//! use lazyseg_core::{Config, EvictionConfig, LazyList};
//!
//! let config = Config::for_list()
//!     .max_segment_size(3)
//!     .eviction(EvictionConfig::Never);
//! let mut list = LazyList::with_config(config).unwrap();
//!
//! list.extend(0..7).unwrap();
//! assert_eq!(list.segment_count(), 3);
//! assert_eq!(*list.get(5).unwrap(), 5);
//!
//! list.insert(1, 100).unwrap();
//! assert_eq!(list.remove_at(1).unwrap(), 100);
//! ```

mod iter;
mod split;

pub use iter::{Iter, LoadedFirstCursor};
pub use split::ListSplitter;

use crate::config::{Config, DEFAULT_LIST_RESIDENT, DEFAULT_MAX_SEGMENT_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::eviction::{EvictionPolicy, RecencyPolicy};
use crate::index::{segment_for_index, SeqSpan};
use crate::manifest::{ListManifest, ListSegmentEntry};
use crate::persistence::{MemoryPayloads, PayloadStore};
use crate::segment::{Segment, SegmentDebug, SegmentTable};
use crate::stats::SegmentStats;
use crate::types::SegmentId;
use serde::Serialize;
use std::fmt;
use std::ops::{ControlFlow, Range};
use tracing::debug;

/// Introspection record for one sequence segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    /// Segment identity.
    pub id: SegmentId,
    /// First logical index covered.
    pub offset: usize,
    /// Element count.
    pub len: usize,
    /// Payload is in memory.
    pub loaded: bool,
    /// Mutated since last flush.
    pub dirty: bool,
    /// Held by a traversal.
    pub pinned: bool,
}

/// An ordered sequence whose elements are paged in segment by segment.
///
/// Reads take `&mut self` because any access may page a segment in and
/// evict others.
pub struct LazyList<T, S = MemoryPayloads<Vec<T>>> {
    table: SegmentTable<T, SeqSpan, S>,
    len: usize,
    max_segment_size: usize,
    generation: u64,
}

impl<T: Clone> LazyList<T> {
    /// Creates an empty list with default capacity and eviction, keeping
    /// persisted payloads in memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: SegmentTable::new(
                Box::new(RecencyPolicy::preset(DEFAULT_LIST_RESIDENT)),
                MemoryPayloads::new(),
            ),
            len: 0,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            generation: 0,
        }
    }

    /// Creates an empty list from `config`, keeping persisted payloads in
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid.
    pub fn with_config(config: Config) -> CoreResult<Self> {
        Self::with_store(config, MemoryPayloads::new())
    }
}

impl<T: Clone> Default for LazyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> LazyList<T, S>
where
    S: PayloadStore<Vec<T>>,
{
    /// Creates an empty list over `store`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid.
    pub fn with_store(config: Config, store: S) -> CoreResult<Self> {
        config.validate_list()?;
        let policy = config.eviction.build()?;
        Self::with_policy(config.max_segment_size, policy, store)
    }

    /// Creates an empty list with an explicit policy instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `max_segment_size` is zero.
    pub fn with_policy(
        max_segment_size: usize,
        policy: Box<dyn EvictionPolicy>,
        store: S,
    ) -> CoreResult<Self> {
        if max_segment_size == 0 {
            return Err(CoreError::invalid_configuration(
                "list max_segment_size must be at least 1",
            ));
        }
        Ok(Self {
            table: SegmentTable::new(policy, store),
            len: 0,
            max_segment_size,
            generation: 0,
        })
    }

    /// Reopens a flushed list. Every segment starts unloaded and clean.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the manifest is inconsistent.
    pub fn open(
        manifest: &ListManifest,
        store: S,
        policy: Box<dyn EvictionPolicy>,
    ) -> CoreResult<Self> {
        manifest.validate()?;

        let mut offset = 0;
        let mut segments = Vec::with_capacity(manifest.segments.len());
        for entry in &manifest.segments {
            segments.push(Segment::restored(entry.id, entry.len, SeqSpan { offset }));
            offset += entry.len;
        }
        debug!(
            segments = segments.len(),
            len = offset,
            "opened list from manifest"
        );

        Ok(Self {
            table: SegmentTable::with_segments(segments, policy, store),
            len: offset,
            max_segment_size: manifest.max_segment_size,
            generation: 0,
        })
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the list holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the segment capacity.
    #[must_use]
    pub fn max_segment_size(&self) -> usize {
        self.max_segment_size
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.table.count()
    }

    /// Returns the structural change counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns paging statistics.
    #[must_use]
    pub fn stats(&self) -> &SegmentStats {
        &self.table.stats
    }

    /// Returns the eviction policy.
    #[must_use]
    pub fn policy(&self) -> &dyn EvictionPolicy {
        self.table.policy.as_ref()
    }

    /// Returns the payload store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.table.store
    }

    /// Describes every segment without paging anything in.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.table
            .segments
            .iter()
            .map(|segment| {
                let residency = segment.residency();
                SegmentInfo {
                    id: segment.id,
                    offset: segment.span.offset,
                    len: segment.len,
                    loaded: residency.loaded,
                    dirty: residency.dirty,
                    pinned: residency.pinned,
                }
            })
            .collect()
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index >= len`, or the error of paging
    /// the owning segment in.
    pub fn get(&mut self, index: usize) -> CoreResult<&T> {
        self.check_index(index)?;
        let (s, local) = self.locate(index)?;
        let items = self.table.page_in(s)?;
        items.get(local).ok_or_else(|| local_miss(index))
    }

    /// Replaces the element at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index >= len`, or the error of paging
    /// the owning segment in.
    pub fn set(&mut self, index: usize, value: T) -> CoreResult<T> {
        self.check_index(index)?;
        let (s, local) = self.locate(index)?;
        let items = self.table.page_in_for_write(s)?;
        let slot = items.get_mut(local).ok_or_else(|| local_miss(index))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the last segment in.
    pub fn push(&mut self, value: T) -> CoreResult<()> {
        let last = self.tail_with_room();
        self.table.page_in_for_write(last)?.push(value);
        self.table.segments[last].len += 1;
        self.len += 1;
        self.bump();
        Ok(())
    }

    /// Appends every element of `items`. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the last segment in. Elements appended
    /// before the failure stay in the list.
    pub fn extend<I>(&mut self, items: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = items.into_iter().peekable();
        let mut added = 0;
        let mut failure = None;

        while items.peek().is_some() {
            let last = self.tail_with_room();
            let room = self.max_segment_size - self.table.segments[last].len;
            match self.table.page_in_for_write(last) {
                Ok(payload) => {
                    let before = payload.len();
                    payload.extend(items.by_ref().take(room));
                    let appended = payload.len() - before;
                    self.table.segments[last].len += appended;
                    self.len += appended;
                    added += appended;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if added > 0 {
            self.update_offsets();
            self.bump();
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(added),
        }
    }

    /// Inserts an element at `index`, shifting later elements up.
    ///
    /// A full segment hands its last element to the next segment when that
    /// one has room, or to a new segment otherwise, so an insert only moves
    /// elements of one segment.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index > len`, or the error of paging a
    /// segment in. The list is unchanged on error.
    pub fn insert(&mut self, index: usize, value: T) -> CoreResult<()> {
        if index > self.len {
            return Err(CoreError::index_out_of_range(index, self.len));
        }
        if index == self.len {
            return self.push(value);
        }

        let (s, local) = self.locate(index)?;
        if self.table.segments[s].len >= self.max_segment_size {
            self.make_room(s)?;
        }
        self.table.page_in_for_write(s)?.insert(local, value);
        self.table.segments[s].len += 1;

        self.len += 1;
        self.update_offsets();
        self.bump();
        Ok(())
    }

    /// Inserts all `items` at `index`, keeping their order. Returns how many
    /// were inserted.
    ///
    /// The items are collected before the list is touched.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index > len`, or the error of paging the
    /// target segment in.
    pub fn insert_all<I>(&mut self, index: usize, items: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        if index > self.len {
            return Err(CoreError::index_out_of_range(index, self.len));
        }
        if index == self.len {
            return self.extend(items);
        }
        let mut items: Vec<T> = items.into_iter().collect();
        let count = items.len();
        if count == 0 {
            return Ok(0);
        }

        let (s, local) = self.locate(index)?;
        if self.table.segments[s].len + count <= self.max_segment_size {
            let payload = self.table.page_in_for_write(s)?;
            let tail = payload.split_off(local);
            payload.extend(items);
            payload.extend(tail);
            self.table.segments[s].len += count;
        } else if index == 0 {
            self.insert_segments(0, items);
        } else {
            let capacity = self.max_segment_size;
            let payload = self.table.page_in_for_write(s)?;
            let tail = payload.split_off(local);
            items.extend(tail);
            let room = capacity.saturating_sub(payload.len());
            let spill = items.split_off(room.min(items.len()));
            payload.extend(items);
            let refilled = payload.len();
            self.table.segments[s].len = refilled;
            self.insert_segments(s + 1, spill);
        }

        self.len += count;
        self.update_offsets();
        self.bump();
        Ok(count)
    }

    /// Removes and returns the element at `index`. A segment left empty is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index >= len`, or the error of paging
    /// the owning segment in.
    pub fn remove_at(&mut self, index: usize) -> CoreResult<T> {
        self.check_index(index)?;
        let (s, local) = self.locate(index)?;

        let payload = self.table.page_in_for_write(s)?;
        if local >= payload.len() {
            return Err(local_miss(index));
        }
        let removed = payload.remove(local);

        self.table.segments[s].len -= 1;
        if self.table.segments[s].len == 0 {
            self.table.destroy(s);
        }
        self.len -= 1;
        self.update_offsets();
        self.bump();
        Ok(removed)
    }

    /// Removes the first element equal to `value`. Returns whether one was
    /// found.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn remove_value(&mut self, value: &T) -> CoreResult<bool>
    where
        T: PartialEq,
    {
        match self.index_of(value)? {
            Some(index) => {
                self.remove_at(index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every element matching `predicate`. Returns how many.
    ///
    /// Every segment is paged in; only segments that lose elements become
    /// dirty. Emptied segments are dropped and offsets recomputed once.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in. Removals in segments visited
    /// before the failure stay applied.
    pub fn remove_if<F>(&mut self, mut predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        let mut failure = None;

        for s in 0..self.table.count() {
            let payload = match self.table.page_in(s) {
                Ok(payload) => payload,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            };
            let before = payload.len();
            payload.retain(|item| !predicate(item));
            let after = payload.len();
            if after != before {
                let segment = &mut self.table.segments[s];
                segment.flags.dirty = true;
                segment.len = after;
                removed += before - after;
            }
        }

        if removed > 0 {
            self.table.destroy_empty();
            self.len -= removed;
            self.update_offsets();
            self.bump();
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }

    /// Keeps only elements matching `predicate`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn retain<F>(&mut self, mut predicate: F) -> CoreResult<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.remove_if(|item| !predicate(item))
    }

    /// Removes every element contained in `values`. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn remove_all(&mut self, values: &[T]) -> CoreResult<usize>
    where
        T: PartialEq,
    {
        self.remove_if(|item| values.contains(item))
    }

    /// Removes every element not contained in `values`. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn retain_all(&mut self, values: &[T]) -> CoreResult<usize>
    where
        T: PartialEq,
    {
        self.remove_if(|item| !values.contains(item))
    }

    /// Removes every element and segment.
    pub fn clear(&mut self) {
        self.table.destroy_all();
        self.len = 0;
        self.bump();
    }

    /// Repacks segments so that every segment but the last is full.
    ///
    /// Leading full segments are kept; from the first segment with spare
    /// room onward, all elements move into new, maximally filled segments.
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in. The list is unchanged on
    /// error.
    pub fn consolidate(&mut self) -> CoreResult<bool> {
        let count = self.table.count();
        if count <= 1 {
            return Ok(false);
        }
        let Some(first) = self.table.segments[..count - 1]
            .iter()
            .position(|segment| segment.len < self.max_segment_size)
        else {
            return Ok(false);
        };

        // Pin while paging in so that later page-ins cannot evict earlier ones.
        for s in first..count {
            if let Err(err) = self.table.page_in(s) {
                for pinned in first..s {
                    let id = self.table.segments[pinned].id;
                    self.table.unpin(id);
                }
                return Err(err);
            }
            self.table.pin(s);
        }

        let mut elements = Vec::with_capacity(self.len - self.table.segments[first].span.offset);
        for segment in &mut self.table.segments[first..] {
            segment.flags.pins = segment.flags.pins.saturating_sub(1);
            elements.extend(segment.payload.take().unwrap_or_default());
        }
        while self.table.count() > first {
            let last = self.table.count() - 1;
            self.table.destroy(last);
        }
        let moved = elements.len();
        self.insert_segments(first, elements);

        self.update_offsets();
        self.bump();
        debug!(
            from_segment = first,
            moved,
            segments = self.table.count(),
            "consolidated list"
        );
        Ok(true)
    }

    /// Returns whether any element equals `value`.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn contains(&mut self, value: &T) -> CoreResult<bool>
    where
        T: PartialEq,
    {
        Ok(self.index_of(value)?.is_some())
    }

    /// Returns the index of the first element equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn index_of(&mut self, value: &T) -> CoreResult<Option<usize>>
    where
        T: PartialEq,
    {
        self.index_of_in(0..self.len, value)
    }

    /// Returns the index of the last element equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn last_index_of(&mut self, value: &T) -> CoreResult<Option<usize>>
    where
        T: PartialEq,
    {
        self.last_index_of_in(0..self.len, value)
    }

    /// Returns the index of the first element in `range` equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `range` exceeds the list, or the error
    /// of paging a segment in.
    pub fn index_of_in(&mut self, range: Range<usize>, value: &T) -> CoreResult<Option<usize>>
    where
        T: PartialEq,
    {
        let flow = self.try_for_each_in(range, |_, item| {
            if item == value {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found(flow))
    }

    /// Returns the index of the last element in `range` equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `range` exceeds the list, or the error
    /// of paging a segment in.
    pub fn last_index_of_in(
        &mut self,
        range: Range<usize>,
        value: &T,
    ) -> CoreResult<Option<usize>>
    where
        T: PartialEq,
    {
        let flow = self.try_rfor_each_in(range, |_, item| {
            if item == value {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found(flow))
    }

    /// Visits the elements of `range` in ascending order, segment by
    /// segment, touching each segment once. Stops at the first `Break` and
    /// returns its index.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `range` exceeds the list, or the error
    /// of paging a segment in.
    pub fn try_for_each_in<F>(
        &mut self,
        range: Range<usize>,
        mut visit: F,
    ) -> CoreResult<ControlFlow<usize>>
    where
        F: FnMut(usize, &T) -> ControlFlow<()>,
    {
        self.check_range(&range)?;
        if range.is_empty() {
            return Ok(ControlFlow::Continue(()));
        }

        let mut s = self.segment_for(range.start)?;
        while s < self.table.count() {
            let (offset, len) = self.bounds(s);
            if offset >= range.end {
                break;
            }
            let lo = range.start.max(offset) - offset;
            let hi = range.end.min(offset + len) - offset;
            let items = self.table.page_in(s)?;
            let window = items.get(lo..hi).ok_or_else(|| local_miss(offset + hi))?;
            for (k, item) in window.iter().enumerate() {
                if visit(offset + lo + k, item).is_break() {
                    return Ok(ControlFlow::Break(offset + lo + k));
                }
            }
            s += 1;
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Like [`try_for_each_in`](Self::try_for_each_in), in descending order.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `range` exceeds the list, or the error
    /// of paging a segment in.
    pub fn try_rfor_each_in<F>(
        &mut self,
        range: Range<usize>,
        mut visit: F,
    ) -> CoreResult<ControlFlow<usize>>
    where
        F: FnMut(usize, &T) -> ControlFlow<()>,
    {
        self.check_range(&range)?;
        if range.is_empty() {
            return Ok(ControlFlow::Continue(()));
        }

        let mut s = self.segment_for(range.end - 1)?;
        loop {
            let (offset, len) = self.bounds(s);
            if offset + len <= range.start {
                break;
            }
            let lo = range.start.max(offset) - offset;
            let hi = range.end.min(offset + len) - offset;
            let items = self.table.page_in(s)?;
            let window = items.get(lo..hi).ok_or_else(|| local_miss(offset + hi))?;
            for (k, item) in window.iter().enumerate().rev() {
                if visit(offset + lo + k, item).is_break() {
                    return Ok(ControlFlow::Break(offset + lo + k));
                }
            }
            if s == 0 {
                break;
            }
            s -= 1;
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Copies every element into a `Vec`.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn to_vec(&mut self) -> CoreResult<Vec<T>>
    where
        T: Clone,
    {
        let mut out = Vec::with_capacity(self.len);
        self.try_for_each_in(0..self.len, |_, item| {
            out.push(item.clone());
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Iterates over clones of all elements.
    pub fn iter(&mut self) -> Iter<'_, T, S>
    where
        T: Clone,
    {
        let len = self.len;
        Iter::new(self, 0..len)
    }

    /// Iterates over clones of the elements in `range`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `range` exceeds the list.
    pub fn iter_range(&mut self, range: Range<usize>) -> CoreResult<Iter<'_, T, S>>
    where
        T: Clone,
    {
        self.check_range(&range)?;
        Ok(Iter::new(self, range))
    }

    /// Returns a detached cursor visiting loaded segments before unloaded
    /// ones.
    #[must_use]
    pub fn loaded_first(&self) -> LoadedFirstCursor {
        LoadedFirstCursor::new()
    }

    /// Returns a detached, segment-aligned splitter over the whole list.
    #[must_use]
    pub fn splitter(&self) -> ListSplitter {
        ListSplitter::new()
    }

    /// Persists every dirty loaded segment and marks it clean. Returns how
    /// many segments were persisted.
    ///
    /// # Errors
    ///
    /// Returns the store's error; segments persisted before it stay clean.
    pub fn flush(&mut self) -> CoreResult<usize> {
        self.table.flush()
    }

    /// Flushes and returns the manifest needed to [`open`](Self::open) the
    /// list again.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub fn checkpoint(&mut self) -> CoreResult<ListManifest> {
        self.flush()?;
        Ok(ListManifest {
            max_segment_size: self.max_segment_size,
            segments: self
                .table
                .segments
                .iter()
                .map(|segment| ListSegmentEntry {
                    id: segment.id,
                    len: segment.len,
                })
                .collect(),
        })
    }

    /// Copies the list into new segments sharing a clone of the store, with
    /// a fresh policy of the same configuration.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn try_clone(&mut self) -> CoreResult<Self>
    where
        T: Clone,
        S: Clone,
    {
        Ok(Self {
            table: self.table.try_clone()?,
            len: self.len,
            max_segment_size: self.max_segment_size,
            generation: 0,
        })
    }

    /// Checks structural invariants without paging anything in.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegmentIndex` describing the first violation.
    pub fn verify(&self) -> CoreResult<()> {
        let mut expected = 0;
        for (s, segment) in self.table.segments.iter().enumerate() {
            if segment.span.offset != expected {
                return Err(CoreError::corrupt_index(format!(
                    "segment {s} starts at {}, expected {expected}",
                    segment.span.offset
                )));
            }
            if segment.len == 0 || segment.len > self.max_segment_size {
                return Err(CoreError::corrupt_index(format!(
                    "segment {s} holds {} elements, capacity {}",
                    segment.len, self.max_segment_size
                )));
            }
            expected += segment.len;
        }
        if expected != self.len {
            return Err(CoreError::corrupt_index(format!(
                "segments hold {expected} elements, list says {}",
                self.len
            )));
        }
        self.table.verify_payloads()
    }

    // === internals ===

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn check_index(&self, index: usize) -> CoreResult<()> {
        if index >= self.len {
            return Err(CoreError::index_out_of_range(index, self.len));
        }
        Ok(())
    }

    fn check_range(&self, range: &Range<usize>) -> CoreResult<()> {
        if range.end > self.len {
            return Err(CoreError::index_out_of_range(range.end, self.len));
        }
        if range.start > range.end {
            return Err(CoreError::index_out_of_range(range.start, range.end));
        }
        Ok(())
    }

    pub(crate) fn segment_for(&self, index: usize) -> CoreResult<usize> {
        segment_for_index(&self.table.segments, index, self.max_segment_size)
    }

    /// Segment index and position inside it.
    fn locate(&self, index: usize) -> CoreResult<(usize, usize)> {
        let s = self.segment_for(index)?;
        Ok((s, index - self.table.segments[s].span.offset))
    }

    /// Offset and length of segment `s`.
    pub(crate) fn bounds(&self, s: usize) -> (usize, usize) {
        let segment = &self.table.segments[s];
        (segment.span.offset, segment.len)
    }

    fn update_offsets(&mut self) {
        let mut offset = 0;
        for segment in &mut self.table.segments {
            segment.span.offset = offset;
            offset += segment.len;
        }
    }

    /// Index of the last segment, creating one if it is missing or full.
    fn tail_with_room(&mut self) -> usize {
        match self.table.segments.last() {
            Some(last) if last.len < self.max_segment_size => self.table.count() - 1,
            _ => {
                let at = self.table.count();
                self.table
                    .create(at, Vec::new(), SeqSpan { offset: self.len });
                at
            }
        }
    }

    /// Moves the last element of full segment `s` to the next segment, or to
    /// a new one when the next is missing or full.
    fn make_room(&mut self, s: usize) -> CoreResult<()> {
        let next_has_room = self
            .table
            .segments
            .get(s + 1)
            .is_some_and(|next| next.len < self.max_segment_size);

        let moved = self
            .table
            .page_in_for_write(s)?
            .pop()
            .ok_or_else(|| CoreError::corrupt_index(format!("full segment {s} holds nothing")))?;
        self.table.segments[s].len -= 1;

        if next_has_room {
            match self.table.page_in_for_write(s + 1) {
                Ok(next) => {
                    next.insert(0, moved);
                    self.table.segments[s + 1].len += 1;
                }
                Err(err) => {
                    // `s` is dirty, so it is still loaded.
                    if let Some(items) = self.table.segments[s].payload.peek_mut() {
                        items.push(moved);
                        self.table.segments[s].len += 1;
                    }
                    return Err(err);
                }
            }
        } else {
            self.table.create(s + 1, vec![moved], SeqSpan::default());
        }
        Ok(())
    }

    /// Inserts full segments holding `items` starting at position `at`.
    fn insert_segments(&mut self, at: usize, items: Vec<T>) {
        let mut items = items.into_iter().peekable();
        let mut at = at;
        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.max_segment_size).collect();
            self.table.create(at, chunk, SeqSpan::default());
            at += 1;
        }
    }
}

fn found(flow: ControlFlow<usize>) -> Option<usize> {
    match flow {
        ControlFlow::Break(index) => Some(index),
        ControlFlow::Continue(()) => None,
    }
}

fn local_miss(index: usize) -> CoreError {
    CoreError::corrupt_index(format!("segment payload does not hold index {index}"))
}

impl<T: fmt::Debug, S> fmt::Debug for LazyList<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for segment in &self.table.segments {
            match segment.payload.peek() {
                Some(items) => {
                    list.entries(items);
                }
                None => {
                    list.entry(&SegmentDebug(segment));
                }
            }
        }
        list.finish()
    }
}
