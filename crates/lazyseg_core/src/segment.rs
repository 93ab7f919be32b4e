//! Segments and the table that pages them in and out.

use crate::error::{CoreError, CoreResult};
use crate::eviction::{EvictionPolicy, EvictionTarget};
use crate::lazy::{ClearGuard, Lazy};
use crate::persistence::PayloadStore;
use crate::stats::SegmentStats;
use crate::types::{Residency, SegmentId};
use std::fmt;
use tracing::{debug, trace, warn};

/// Dirty and pin state of a segment. Doubles as the payload's clear guard.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SegmentFlags {
    pub(crate) dirty: bool,
    pub(crate) pins: u32,
}

impl ClearGuard for SegmentFlags {
    fn allow_clear(&self) -> bool {
        !self.dirty
    }
}

/// One bounded partition of a container.
///
/// `Sp` carries the container-specific position: an offset for sequences, a
/// hash range for maps.
#[derive(Debug)]
pub(crate) struct Segment<E, Sp> {
    pub(crate) id: SegmentId,
    pub(crate) len: usize,
    pub(crate) span: Sp,
    pub(crate) flags: SegmentFlags,
    pub(crate) payload: Lazy<Vec<E>>,
}

impl<E, Sp> Segment<E, Sp> {
    /// A new, never persisted segment holding `items`.
    pub(crate) fn fresh(items: Vec<E>, span: Sp) -> Self {
        let id = SegmentId::new();
        Self {
            id,
            len: items.len(),
            span,
            flags: SegmentFlags {
                dirty: true,
                pins: 0,
            },
            payload: Lazy::loaded(id, items),
        }
    }

    /// A segment whose payload is persisted under `id`.
    pub(crate) fn restored(id: SegmentId, len: usize, span: Sp) -> Self {
        Self {
            id,
            len,
            span,
            flags: SegmentFlags::default(),
            payload: Lazy::unloaded(id),
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.payload.is_loaded()
    }

    pub(crate) fn residency(&self) -> Residency {
        Residency {
            loaded: self.payload.is_loaded(),
            dirty: self.flags.dirty,
            pinned: self.flags.pins > 0,
        }
    }
}

/// Debug view of one segment that never pages in.
pub(crate) struct SegmentDebug<'a, E, Sp>(pub(crate) &'a Segment<E, Sp>);

impl<E: fmt::Debug, Sp> fmt::Debug for SegmentDebug<'_, E, Sp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.payload.peek() {
            Some(items) => f.debug_list().entries(items).finish(),
            None => write!(f, "[{} unloaded]", self.0.len),
        }
    }
}

/// Eviction view over a container's segments.
pub(crate) struct Residents<'a, E, Sp, S: ?Sized> {
    segments: &'a mut [Segment<E, Sp>],
    store: &'a S,
    stats: &'a SegmentStats,
}

impl<E, Sp, S> EvictionTarget for Residents<'_, E, Sp, S>
where
    S: PayloadStore<Vec<E>> + ?Sized,
{
    fn status(&self, id: SegmentId) -> Option<Residency> {
        self.segments
            .iter()
            .find(|segment| segment.id == id)
            .map(Segment::residency)
    }

    fn evict(&mut self, id: SegmentId) -> bool {
        let Some(segment) = self.segments.iter_mut().find(|segment| segment.id == id) else {
            return false;
        };
        if segment.flags.pins > 0 {
            return false;
        }
        let evicted = segment.payload.clear(&segment.flags, self.store);
        if evicted {
            self.stats.record_eviction();
            debug!(segment = %id, len = segment.len, "evicted segment");
        }
        evicted
    }
}

/// Ordered segments plus everything needed to page them.
pub(crate) struct SegmentTable<E, Sp, S> {
    pub(crate) segments: Vec<Segment<E, Sp>>,
    pub(crate) policy: Box<dyn EvictionPolicy>,
    pub(crate) store: S,
    pub(crate) stats: SegmentStats,
}

impl<E, Sp, S> SegmentTable<E, Sp, S>
where
    S: PayloadStore<Vec<E>>,
{
    pub(crate) fn new(policy: Box<dyn EvictionPolicy>, store: S) -> Self {
        Self {
            segments: Vec::new(),
            policy,
            store,
            stats: SegmentStats::new(),
        }
    }

    pub(crate) fn with_segments(
        segments: Vec<Segment<E, Sp>>,
        policy: Box<dyn EvictionPolicy>,
        store: S,
    ) -> Self {
        Self {
            segments,
            policy,
            store,
            stats: SegmentStats::new(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn segment(&self, idx: usize) -> CoreResult<&Segment<E, Sp>> {
        self.segments.get(idx).ok_or_else(|| {
            CoreError::corrupt_index(format!(
                "segment {idx} requested of {}",
                self.segments.len()
            ))
        })
    }

    /// Reports a touch of segment `id` to the policy.
    fn track(&mut self, id: SegmentId) {
        let mut residents = Residents {
            segments: &mut self.segments,
            store: &self.store,
            stats: &self.stats,
        };
        self.policy.touch(id, &mut residents);
    }

    /// Reports a touch of segment `idx`, then returns its payload.
    pub(crate) fn page_in(&mut self, idx: usize) -> CoreResult<&mut Vec<E>> {
        let id = self.segment(idx)?.id;
        self.track(id);

        let segment = &mut self.segments[idx];
        if !segment.payload.is_loaded() {
            let fetched = segment.payload.load(&self.store)?.len();
            self.stats.record_load();
            if fetched != segment.len {
                segment.payload.take();
                return Err(CoreError::corrupt_index(format!(
                    "segment {id} holds {fetched} elements, index says {}",
                    segment.len
                )));
            }
            debug!(segment = %id, len = fetched, "paged in segment");
        }
        segment.payload.load(&self.store)
    }

    /// Like [`page_in`](Self::page_in), and marks the segment dirty.
    pub(crate) fn page_in_for_write(&mut self, idx: usize) -> CoreResult<&mut Vec<E>> {
        self.page_in(idx)?;
        let segment = &mut self.segments[idx];
        segment.flags.dirty = true;
        segment.payload.load(&self.store)
    }

    /// Inserts a fresh segment at `at` and returns its identity.
    ///
    /// The segment is reported to the policy right away. It is dirty and so
    /// stays resident, but once flushed it competes for residency like any
    /// touched segment.
    pub(crate) fn create(&mut self, at: usize, items: Vec<E>, span: Sp) -> SegmentId {
        let segment = Segment::fresh(items, span);
        let id = segment.id;
        trace!(segment = %id, at, len = segment.len, "created segment");
        self.segments.insert(at, segment);
        self.stats.record_segment_created();
        self.track(id);
        id
    }

    /// Removes segment `idx` for good.
    pub(crate) fn destroy(&mut self, idx: usize) -> Segment<E, Sp> {
        let segment = self.segments.remove(idx);
        self.policy.forget(segment.id);
        if let Err(err) = self.store.release(segment.id) {
            warn!(segment = %segment.id, error = %err, "failed to release destroyed segment");
        }
        self.stats.record_segment_dropped();
        trace!(segment = %segment.id, "dropped segment");
        segment
    }

    /// Destroys every segment.
    pub(crate) fn destroy_all(&mut self) {
        while let Some(last) = self.segments.len().checked_sub(1) {
            self.destroy(last);
        }
    }

    /// Destroys every segment holding no elements. Returns how many.
    pub(crate) fn destroy_empty(&mut self) -> usize {
        let mut dropped = 0;
        let mut idx = self.segments.len();
        while idx > 0 {
            idx -= 1;
            if self.segments[idx].len == 0 {
                self.destroy(idx);
                dropped += 1;
            }
        }
        dropped
    }

    pub(crate) fn pin(&mut self, idx: usize) {
        if let Some(segment) = self.segments.get_mut(idx) {
            segment.flags.pins += 1;
        }
    }

    pub(crate) fn unpin(&mut self, id: SegmentId) {
        if let Some(segment) = self.segments.iter_mut().find(|segment| segment.id == id) {
            segment.flags.pins = segment.flags.pins.saturating_sub(1);
        }
    }

    /// Hands every loaded dirty payload to the store and marks it clean.
    pub(crate) fn flush(&mut self) -> CoreResult<usize> {
        let mut persisted = 0;
        for segment in &mut self.segments {
            if !segment.flags.dirty {
                continue;
            }
            if let Some(items) = segment.payload.peek() {
                self.store.persist(segment.id, items)?;
                segment.flags.dirty = false;
                self.stats.record_persist();
                persisted += 1;
            }
        }
        if persisted > 0 {
            debug!(persisted, segments = self.segments.len(), "flushed segments");
        }
        Ok(persisted)
    }

    /// Copies every segment under a new identity with a fresh policy.
    pub(crate) fn try_clone(&mut self) -> CoreResult<Self>
    where
        E: Clone,
        Sp: Clone,
        S: Clone,
    {
        let mut copies = Vec::with_capacity(self.segments.len());
        for idx in 0..self.segments.len() {
            let items = self.page_in(idx)?.clone();
            copies.push(Segment::fresh(items, self.segments[idx].span.clone()));
        }
        let mut table = Self::with_segments(copies, self.policy.fresh(), self.store.clone());
        for idx in 0..table.segments.len() {
            table.stats.record_segment_created();
            let id = table.segments[idx].id;
            table.track(id);
        }
        Ok(table)
    }

    /// Checks that loaded payloads agree with recorded sizes.
    pub(crate) fn verify_payloads(&self) -> CoreResult<()> {
        for segment in &self.segments {
            if let Some(items) = segment.payload.peek() {
                if items.len() != segment.len {
                    return Err(CoreError::corrupt_index(format!(
                        "segment {} holds {} elements, index says {}",
                        segment.id,
                        items.len(),
                        segment.len
                    )));
                }
            }
            if segment.flags.dirty && !segment.is_loaded() {
                return Err(CoreError::corrupt_index(format!(
                    "segment {} is dirty but unloaded",
                    segment.id
                )));
            }
        }
        Ok(())
    }
}
