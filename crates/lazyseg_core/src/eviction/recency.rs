//! Recency-bounded eviction.

use super::{consider, EvictionPolicy, EvictionTarget, Verdict};
use crate::error::{CoreError, CoreResult};
use crate::types::SegmentId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

/// Keeps roughly the `resident` most recently touched segments loaded.
///
/// On each touch the segment moves to the most recent end. While more than
/// `resident` segments are tracked, the policy walks from the least recent
/// end and evicts every eligible segment. Dirty or pinned segments are
/// skipped in place, so the tracked set can exceed `resident` for a while.
#[derive(Debug)]
pub struct RecencyPolicy {
    resident: usize,
    order: Mutex<VecDeque<SegmentId>>,
}

impl RecencyPolicy {
    /// Creates a policy keeping `resident` segments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `resident` is zero.
    pub fn new(resident: usize) -> CoreResult<Self> {
        if resident == 0 {
            return Err(CoreError::invalid_configuration(
                "recency policy needs a resident count of at least 1",
            ));
        }
        Ok(Self {
            resident,
            order: Mutex::new(VecDeque::new()),
        })
    }

    /// Builds a policy from a built-in default resident count.
    pub(crate) fn preset(resident: usize) -> Self {
        Self {
            resident: resident.max(1),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the desired resident count.
    #[must_use]
    pub const fn resident(&self) -> usize {
        self.resident
    }

    /// Returns tracked segments from least to most recently touched.
    #[must_use]
    pub fn order(&self) -> Vec<SegmentId> {
        self.order.lock().iter().copied().collect()
    }
}

impl EvictionPolicy for RecencyPolicy {
    fn touch(&self, id: SegmentId, target: &mut dyn EvictionTarget) {
        let mut order = self.order.lock();

        if order.back() != Some(&id) {
            if let Some(pos) = order.iter().position(|tracked| *tracked == id) {
                order.remove(pos);
            }
            order.push_back(id);
        }

        // The touched segment sits at the back and is never a candidate.
        let mut cursor = 0;
        while order.len() > self.resident && cursor + 1 < order.len() {
            let candidate = order[cursor];
            match consider(target, candidate, id) {
                Verdict::Untrack => {
                    order.remove(cursor);
                    trace!(segment = %candidate, tracked = order.len(), "recency untracked");
                }
                Verdict::Keep => cursor += 1,
            }
        }
    }

    fn forget(&self, id: SegmentId) {
        self.order.lock().retain(|tracked| *tracked != id);
    }

    fn fresh(&self) -> Box<dyn EvictionPolicy> {
        Box::new(Self {
            resident: self.resident,
            order: Mutex::new(VecDeque::new()),
        })
    }

    fn tracked(&self) -> usize {
        self.order.lock().len()
    }

    fn name(&self) -> &'static str {
        "recency"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn zero_resident_rejected() {
        assert!(matches!(
            RecencyPolicy::new(0),
            Err(CoreError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn touching_four_keeps_last_two() {
        let [a, b, c, d] = ids(4).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b, c, d]);
        let policy = RecencyPolicy::new(2).unwrap();

        for id in [a, b, c, d] {
            policy.touch(id, &mut target);
        }

        assert!(!target.loaded(a));
        assert!(!target.loaded(b));
        assert!(target.loaded(c));
        assert!(target.loaded(d));
        assert_eq!(target.evicted, vec![a, b]);
        assert_eq!(policy.order(), vec![c, d]);
    }

    #[test]
    fn dirty_segment_survives_any_touches() {
        let segments = ids(8);
        let mut target = FakeTarget::with_loaded(&segments);
        let policy = RecencyPolicy::new(2).unwrap();

        let (a, b, c) = (segments[0], segments[1], segments[2]);
        for id in [a, b, c] {
            policy.touch(id, &mut target);
        }
        target.set(c, |r| r.dirty = true);

        for id in &segments[3..] {
            policy.touch(*id, &mut target);
        }
        assert!(target.loaded(c));
        assert!(!target.evicted.contains(&c));
        assert!(policy.order().contains(&c));
    }

    #[test]
    fn pinned_segments_let_tracking_exceed_bound() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b, c]);
        target.set(a, |r| r.pinned = true);
        target.set(b, |r| r.pinned = true);
        let policy = RecencyPolicy::new(1).unwrap();

        for id in [a, b, c] {
            policy.touch(id, &mut target);
        }

        assert!(target.evicted.is_empty());
        assert_eq!(policy.tracked(), 3);

        target.set(a, |r| r.pinned = false);
        policy.touch(c, &mut target);
        assert_eq!(target.evicted, vec![a]);
        assert_eq!(policy.order(), vec![b, c]);
    }

    #[test]
    fn retouch_moves_to_back() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b, c]);
        let policy = RecencyPolicy::new(2).unwrap();

        policy.touch(a, &mut target);
        policy.touch(b, &mut target);
        policy.touch(a, &mut target);
        policy.touch(c, &mut target);

        assert_eq!(target.evicted, vec![b]);
        assert_eq!(policy.order(), vec![a, c]);
    }

    #[test]
    fn forget_and_fresh() {
        let [a, b] = ids(2).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b]);
        let policy = RecencyPolicy::new(3).unwrap();

        policy.touch(a, &mut target);
        policy.touch(b, &mut target);
        policy.forget(a);
        assert_eq!(policy.order(), vec![b]);

        let copy = policy.fresh();
        assert_eq!(copy.tracked(), 0);
        assert_eq!(copy.name(), "recency");
    }
}
