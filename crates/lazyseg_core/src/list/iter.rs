//! Sequence traversal.

use super::LazyList;
use crate::error::{CoreError, CoreResult};
use crate::persistence::PayloadStore;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::ops::Range;

/// Borrowing iterator over clones of a range of list elements.
///
/// Every step may page a segment in, so items are results. The iterator
/// stops after the first error.
pub struct Iter<'a, T, S> {
    list: &'a mut LazyList<T, S>,
    front: usize,
    back: usize,
}

impl<'a, T, S> Iter<'a, T, S> {
    pub(super) fn new(list: &'a mut LazyList<T, S>, range: Range<usize>) -> Self {
        Self {
            list,
            front: range.start,
            back: range.end,
        }
    }
}

impl<T, S> Iter<'_, T, S>
where
    T: Clone,
    S: PayloadStore<Vec<T>>,
{
    fn fetch(&mut self, index: usize) -> CoreResult<T> {
        let result = self.list.get(index).cloned();
        if result.is_err() {
            self.front = self.back;
        }
        result
    }
}

impl<T, S> Iterator for Iter<'_, T, S>
where
    T: Clone,
    S: PayloadStore<Vec<T>>,
{
    type Item = CoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let index = self.front;
        self.front += 1;
        Some(self.fetch(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<T, S> DoubleEndedIterator for Iter<'_, T, S>
where
    T: Clone,
    S: PayloadStore<Vec<T>>,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        let index = self.back;
        Some(self.fetch(index))
    }
}

impl<T, S> ExactSizeIterator for Iter<'_, T, S>
where
    T: Clone,
    S: PayloadStore<Vec<T>>,
{
}

impl<T, S> FusedIterator for Iter<'_, T, S>
where
    T: Clone,
    S: PayloadStore<Vec<T>>,
{
}

/// Detached cursor that yields every element of currently loaded segments
/// before touching unloaded ones.
///
/// The visiting order is fixed when the first element is requested: loaded
/// segments in ascending order, then the rest in ascending order. Within a
/// segment elements come in index order. Structural changes made through
/// anything but [`remove`](Self::remove) fail the cursor.
#[derive(Debug, Default)]
pub struct LoadedFirstCursor {
    queue: Option<VecDeque<usize>>,
    current: Option<usize>,
    local: usize,
    last: Option<(usize, usize)>,
    expected: u64,
}

impl LoadedFirstCursor {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Returns the next element, or `None` once every segment was visited.
    ///
    /// # Errors
    ///
    /// Yields `ConcurrentStructuralChange` if the list changed since the
    /// cursor bound, or the error of paging a segment in.
    pub fn next<T, S>(&mut self, list: &mut LazyList<T, S>) -> Option<CoreResult<T>>
    where
        T: Clone,
        S: PayloadStore<Vec<T>>,
    {
        if let Err(err) = self.bind(list) {
            return Some(Err(err));
        }

        loop {
            let s = match self.current {
                Some(s) => s,
                None => {
                    let s = self.queue.as_mut()?.pop_front()?;
                    self.current = Some(s);
                    self.local = 0;
                    s
                }
            };

            let (_, len) = list.bounds(s);
            if self.local >= len {
                self.current = None;
                continue;
            }

            let local = self.local;
            let item = match list.table.page_in(s) {
                Ok(items) => items.get(local).cloned(),
                Err(err) => return Some(Err(err)),
            };
            self.local += 1;
            self.last = Some((s, local));
            return Some(item.ok_or_else(|| {
                CoreError::corrupt_index(format!("segment {s} does not hold position {local}"))
            }));
        }
    }

    /// Removes the element most recently returned by [`next`](Self::next).
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if there is no such element,
    /// `ConcurrentStructuralChange` if the list changed behind the cursor,
    /// or the removal's own error.
    pub fn remove<T, S>(&mut self, list: &mut LazyList<T, S>) -> CoreResult<T>
    where
        S: PayloadStore<Vec<T>>,
    {
        if self.queue.is_some() && list.generation() != self.expected {
            return Err(CoreError::concurrent_change(self.expected, list.generation()));
        }
        let (s, local) = self.last.take().ok_or_else(|| {
            CoreError::invalid_operation("remove called without a preceding element")
        })?;

        let before = list.segment_count();
        let (offset, _) = list.bounds(s);
        let removed = list.remove_at(offset + local)?;

        if list.segment_count() < before {
            if self.current == Some(s) {
                self.current = None;
            }
            if let Some(queue) = self.queue.as_mut() {
                for queued in queue.iter_mut().filter(|queued| **queued > s) {
                    *queued -= 1;
                }
            }
        } else if self.current == Some(s) {
            self.local -= 1;
        }
        self.expected = list.generation();
        Ok(removed)
    }

    fn bind<T, S>(&mut self, list: &LazyList<T, S>) -> CoreResult<()>
    where
        S: PayloadStore<Vec<T>>,
    {
        if self.queue.is_some() {
            if list.generation() != self.expected {
                return Err(CoreError::concurrent_change(self.expected, list.generation()));
            }
            return Ok(());
        }

        let (loaded, unloaded): (Vec<usize>, Vec<usize>) =
            (0..list.segment_count()).partition(|&s| list.table.segments[s].is_loaded());
        self.queue = Some(loaded.into_iter().chain(unloaded).collect());
        self.expected = list.generation();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, EvictionConfig};
    use crate::error::CoreError;
    use crate::list::LazyList;

    fn paged(max: usize, items: std::ops::Range<i32>) -> LazyList<i32> {
        let mut list = LazyList::with_config(
            Config::for_list()
                .max_segment_size(max)
                .eviction(EvictionConfig::Recency { resident: 1 }),
        )
        .unwrap();
        list.extend(items).unwrap();
        list.flush().unwrap();
        list
    }

    fn drain(list: &mut LazyList<i32>) -> Vec<i32> {
        let mut cursor = list.loaded_first();
        let mut seen = Vec::new();
        while let Some(item) = cursor.next(list) {
            seen.push(item.unwrap());
        }
        seen
    }

    #[test]
    fn iter_stops_at_end() {
        let mut list = paged(2, 0..5);
        let mut iter = list.iter();
        assert_eq!(iter.len(), 5);
        let items: Vec<i32> = iter.by_ref().map(Result::unwrap).collect();
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert!(iter.next().is_none());
    }

    #[test]
    fn iter_meets_in_the_middle() {
        let mut list = paged(2, 0..5);
        let mut iter = list.iter();
        assert_eq!(iter.next().unwrap().unwrap(), 0);
        assert_eq!(iter.next_back().unwrap().unwrap(), 4);
        assert_eq!(iter.next_back().unwrap().unwrap(), 3);
        assert_eq!(iter.next().unwrap().unwrap(), 1);
        assert_eq!(iter.next().unwrap().unwrap(), 2);
        assert!(iter.next_back().is_none());
    }

    #[test]
    fn loaded_segments_come_first() {
        let mut list = paged(2, 0..6);
        list.get(4).unwrap();

        let seen = drain(&mut list);
        assert_eq!(seen, vec![4, 5, 0, 1, 2, 3]);
    }

    #[test]
    fn loaded_first_on_empty_list() {
        let mut list = paged(2, 0..0);
        assert!(drain(&mut list).is_empty());
    }

    #[test]
    fn cursor_fails_after_outside_change() {
        let mut list = paged(2, 0..4);
        let mut cursor = list.loaded_first();
        cursor.next(&mut list).unwrap().unwrap();

        list.push(9).unwrap();
        assert!(matches!(
            cursor.next(&mut list),
            Some(Err(CoreError::ConcurrentStructuralChange { .. }))
        ));
        assert!(matches!(
            cursor.remove(&mut list),
            Err(CoreError::ConcurrentStructuralChange { .. })
        ));
    }

    #[test]
    fn cursor_remove_keeps_visiting() {
        let mut list = paged(2, 0..6);
        list.get(2).unwrap();

        let mut cursor = list.loaded_first();
        let mut seen = Vec::new();
        while let Some(item) = cursor.next(&mut list) {
            let item = item.unwrap();
            seen.push(item);
            if item % 2 == 0 {
                assert_eq!(cursor.remove(&mut list).unwrap(), item);
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(list.to_vec().unwrap(), vec![1, 3, 5]);
        list.verify().unwrap();
    }

    #[test]
    fn cursor_remove_drops_emptied_segment() {
        let mut list = paged(2, 0..6);
        list.get(2).unwrap();

        let mut cursor = list.loaded_first();
        for _ in 0..2 {
            cursor.next(&mut list).unwrap().unwrap();
            cursor.remove(&mut list).unwrap();
        }
        assert_eq!(list.segment_count(), 2);

        let rest: Vec<i32> = std::iter::from_fn(|| cursor.next(&mut list))
            .map(Result::unwrap)
            .collect();
        assert_eq!(rest, vec![0, 1, 4, 5]);
    }

    #[test]
    fn remove_needs_an_element() {
        let mut list = paged(2, 0..2);
        let mut cursor = list.loaded_first();
        assert!(matches!(
            cursor.remove(&mut list),
            Err(CoreError::InvalidOperation { .. })
        ));

        cursor.next(&mut list).unwrap().unwrap();
        cursor.remove(&mut list).unwrap();
        assert!(matches!(
            cursor.remove(&mut list),
            Err(CoreError::InvalidOperation { .. })
        ));
    }
}
