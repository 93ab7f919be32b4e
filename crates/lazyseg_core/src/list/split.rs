//! Segment-aligned split traversal for sequences.

use super::LazyList;
use crate::error::{CoreError, CoreResult};
use crate::persistence::PayloadStore;
use crate::types::SegmentId;
use std::ops::ControlFlow;

/// Detached, splittable traversal over a range of list indices.
///
/// The upper bound binds lazily on first use. Splits land on segment
/// boundaries so that each half pages its own segments. The segment being
/// read is pinned until the traversal moves past it or is released.
#[derive(Debug, Default)]
pub struct ListSplitter {
    index: usize,
    fence: Option<usize>,
    expected: u64,
    pinned: Option<SegmentId>,
}

impl ListSplitter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Returns how many elements remain.
    #[must_use]
    pub fn estimate_size<T, S>(&self, list: &LazyList<T, S>) -> usize
    where
        S: PayloadStore<Vec<T>>,
    {
        self.fence
            .unwrap_or_else(|| list.len())
            .saturating_sub(self.index)
    }

    /// Passes the next element to `action`. Returns `false` once exhausted.
    ///
    /// A failed step releases the pin, so an aborted traversal never keeps
    /// a segment resident.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the list changed since this
    /// traversal bound, or the error of paging a segment in.
    pub fn try_advance<T, S, F>(&mut self, list: &mut LazyList<T, S>, action: F) -> CoreResult<bool>
    where
        S: PayloadStore<Vec<T>>,
        F: FnOnce(&T),
    {
        let advanced = self.advance(list, action);
        if advanced.is_err() {
            self.release(list);
        }
        advanced
    }

    fn advance<T, S, F>(&mut self, list: &mut LazyList<T, S>, action: F) -> CoreResult<bool>
    where
        S: PayloadStore<Vec<T>>,
        F: FnOnce(&T),
    {
        let fence = self.bind(list)?;
        if self.index >= fence {
            self.release(list);
            return Ok(false);
        }

        let s = list.segment_for(self.index)?;
        self.hold(list, s);
        let (offset, _) = list.bounds(s);
        let local = self.index - offset;
        let items = list.table.page_in(s)?;
        let item = items.get(local).ok_or_else(|| {
            CoreError::corrupt_index(format!("segment {s} does not hold position {local}"))
        })?;
        action(item);
        self.index += 1;
        Ok(true)
    }

    /// Passes every remaining element to `action`.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the list changed since this
    /// traversal bound, or the error of paging a segment in.
    pub fn for_each_remaining<T, S, F>(
        &mut self,
        list: &mut LazyList<T, S>,
        mut action: F,
    ) -> CoreResult<()>
    where
        S: PayloadStore<Vec<T>>,
        F: FnMut(&T),
    {
        let fence = self.bind(list)?;
        self.release(list);
        if self.index >= fence {
            return Ok(());
        }
        let from = self.index;
        self.index = fence;
        list.try_for_each_in(from..fence, |_, item| {
            action(item);
            ControlFlow::Continue(())
        })?;
        Ok(())
    }

    /// Hands the first part of the remaining range to a new splitter and
    /// keeps the rest.
    ///
    /// The split point is the segment boundary nearest the middle of the
    /// range. Returns `None` when the range lies within one segment.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentStructuralChange` if the list changed since this
    /// traversal bound.
    pub fn try_split<T, S>(&mut self, list: &mut LazyList<T, S>) -> CoreResult<Option<Self>>
    where
        S: PayloadStore<Vec<T>>,
    {
        let hi = self.bind(list)?;
        let lo = self.index;
        if lo >= hi {
            return Ok(None);
        }

        let mid = lo + (hi - lo) / 2;
        let (offset, len) = list.bounds(list.segment_for(mid)?);
        let end = offset + len;
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

        self.release(list);
        self.index = split;
        Ok(Some(Self {
            index: lo,
            fence: Some(split),
            expected: self.expected,
            pinned: None,
        }))
    }

    /// Unpins the segment held by this traversal, if any.
    pub fn release<T, S>(&mut self, list: &mut LazyList<T, S>)
    where
        S: PayloadStore<Vec<T>>,
    {
        if let Some(id) = self.pinned.take() {
            list.table.unpin(id);
        }
    }

    /// Binds the fence on first use, then checks the list is unchanged.
    /// A changed list drops the pin before failing.
    fn bind<T, S>(&mut self, list: &mut LazyList<T, S>) -> CoreResult<usize>
    where
        S: PayloadStore<Vec<T>>,
    {
        match self.fence {
            Some(fence) => {
                if list.generation() != self.expected {
                    self.release(list);
                    return Err(CoreError::concurrent_change(self.expected, list.generation()));
                }
                Ok(fence)
            }
            None => {
                let fence = list.len();
                self.fence = Some(fence);
                self.expected = list.generation();
                Ok(fence)
            }
        }
    }

    fn hold<T, S>(&mut self, list: &mut LazyList<T, S>, s: usize)
    where
        S: PayloadStore<Vec<T>>,
    {
        let id = list.table.segments[s].id;
        if self.pinned == Some(id) {
            return;
        }
        self.release(list);
        list.table.pin(s);
        self.pinned = Some(id);
    }
}
