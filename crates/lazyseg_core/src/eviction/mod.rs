//! Eviction policies.
//!
//! A policy decides which loaded segments to unload. Containers report every
//! payload access through [`EvictionPolicy::touch`]; the policy may then
//! synchronously evict other segments through the [`EvictionTarget`] the
//! container hands in.
//!
//! A segment is eligible for eviction only when it is loaded, clean, unpinned
//! and not the segment being touched. Policies own nothing but their
//! bookkeeping, which sits behind a `parking_lot::Mutex` so a maintenance
//! thread may drive a container while application threads do too.
//!
//! ## Available Policies
//!
//! - [`RecencyPolicy`] - Keep the K most recently touched segments
//! - [`TimedPolicy`] - Unload segments idle for longer than a lifetime
//! - [`NeverPolicy`] - Keep everything resident

mod never;
mod recency;
mod timed;

pub use never::NeverPolicy;
pub use recency::RecencyPolicy;
pub use timed::TimedPolicy;

use crate::types::{Residency, SegmentId};
use std::fmt;

/// The container side of an eviction decision.
pub trait EvictionTarget {
    /// Returns the residency of a segment, or `None` once it no longer
    /// exists. Policies drop unknown segments from their bookkeeping.
    fn status(&self, id: SegmentId) -> Option<Residency>;

    /// Unloads the payload of `id`. Returns whether it was dropped.
    fn evict(&mut self, id: SegmentId) -> bool;
}

/// Strategy deciding which loaded segments to unload.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Records an access to `id` and evicts other eligible segments as the
    /// strategy sees fit.
    fn touch(&self, id: SegmentId, target: &mut dyn EvictionTarget);

    /// Purges bookkeeping for a permanently destroyed segment.
    fn forget(&self, id: SegmentId);

    /// Returns a policy with the same configuration and no bookkeeping.
    fn fresh(&self) -> Box<dyn EvictionPolicy>;

    /// Returns how many segments the policy currently tracks.
    fn tracked(&self) -> usize;

    /// Short name of the strategy.
    fn name(&self) -> &'static str;
}

/// Outcome of considering one tracked segment for eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Unloaded now, or gone already: stop tracking it.
    Untrack,
    /// Still needed in memory: keep tracking it.
    Keep,
}

/// Tries to evict `candidate` on behalf of a touch of `touched`.
pub(crate) fn consider(
    target: &mut dyn EvictionTarget,
    candidate: SegmentId,
    touched: SegmentId,
) -> Verdict {
    if candidate == touched {
        return Verdict::Keep;
    }
    match target.status(candidate) {
        None => Verdict::Untrack,
        Some(residency) if !residency.loaded => Verdict::Untrack,
        Some(residency) if residency.evictable() => {
            if target.evict(candidate) {
                Verdict::Untrack
            } else {
                Verdict::Keep
            }
        }
        Some(_) => Verdict::Keep,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn consider_skips_touched_dirty_and_pinned() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b, c]);
        target.set(b, |r| r.dirty = true);
        target.set(c, |r| r.pinned = true);

        assert_eq!(consider(&mut target, a, a), Verdict::Keep);
        assert_eq!(consider(&mut target, b, a), Verdict::Keep);
        assert_eq!(consider(&mut target, c, a), Verdict::Keep);
        assert!(target.evicted.is_empty());
    }

    #[test]
    fn consider_untracks_gone_and_unloaded() {
        let [a, b, gone] = ids(3).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b]);
        target.set(b, |r| r.loaded = false);

        assert_eq!(consider(&mut target, gone, a), Verdict::Untrack);
        assert_eq!(consider(&mut target, b, a), Verdict::Untrack);
        assert!(target.evicted.is_empty());
    }

    #[test]
    fn consider_evicts_eligible() {
        let [a, b] = ids(2).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b]);

        assert_eq!(consider(&mut target, b, a), Verdict::Untrack);
        assert_eq!(target.evicted, vec![b]);
        assert!(!target.loaded(b));
    }
}
