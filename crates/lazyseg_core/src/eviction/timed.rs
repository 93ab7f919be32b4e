//! Time-based eviction.

use super::{consider, EvictionPolicy, EvictionTarget, Verdict};
use crate::error::{CoreError, CoreResult};
use crate::types::SegmentId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Unloads segments that have not been touched for longer than `lifetime`.
///
/// Every touch stamps the touched segment and sweeps all tracked segments.
/// Without touches nothing is swept; a surrounding scheduler may touch
/// periodically to force proactive eviction.
#[derive(Debug)]
pub struct TimedPolicy {
    lifetime: Duration,
    last_touch: Mutex<HashMap<SegmentId, Instant>>,
}

impl TimedPolicy {
    /// Creates a policy with the given idle lifetime.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `lifetime` is zero.
    pub fn new(lifetime: Duration) -> CoreResult<Self> {
        if lifetime.is_zero() {
            return Err(CoreError::invalid_configuration(
                "timed policy needs a non-zero lifetime",
            ));
        }
        Ok(Self {
            lifetime,
            last_touch: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the configured lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Touches `id` as of `now`.
    pub fn touch_at(&self, id: SegmentId, now: Instant, target: &mut dyn EvictionTarget) {
        let mut last_touch = self.last_touch.lock();
        last_touch.insert(id, now);

        let expired: Vec<SegmentId> = last_touch
            .iter()
            .filter(|(_, stamp)| now.saturating_duration_since(**stamp) > self.lifetime)
            .map(|(segment, _)| *segment)
            .collect();

        for candidate in expired {
            if consider(target, candidate, id) == Verdict::Untrack {
                last_touch.remove(&candidate);
                trace!(segment = %candidate, "timed untracked");
            }
        }
    }
}

impl EvictionPolicy for TimedPolicy {
    fn touch(&self, id: SegmentId, target: &mut dyn EvictionTarget) {
        self.touch_at(id, Instant::now(), target);
    }

    fn forget(&self, id: SegmentId) {
        self.last_touch.lock().remove(&id);
    }

    fn fresh(&self) -> Box<dyn EvictionPolicy> {
        Box::new(Self {
            lifetime: self.lifetime,
            last_touch: Mutex::new(HashMap::new()),
        })
    }

    fn tracked(&self) -> usize {
        self.last_touch.lock().len()
    }

    fn name(&self) -> &'static str {
        "timed"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    const LIFETIME: Duration = Duration::from_millis(100);

    #[test]
    fn zero_lifetime_rejected() {
        assert!(TimedPolicy::new(Duration::ZERO).is_err());
    }

    #[test]
    fn expired_segments_unloaded_on_touch() {
        let [a, b, c] = ids(3).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b, c]);
        let policy = TimedPolicy::new(LIFETIME).unwrap();
        let start = Instant::now();

        policy.touch_at(a, start, &mut target);
        policy.touch_at(b, start + Duration::from_millis(80), &mut target);
        assert!(target.evicted.is_empty());

        policy.touch_at(c, start + Duration::from_millis(150), &mut target);
        assert_eq!(target.evicted, vec![a]);
        assert_eq!(policy.tracked(), 2);
    }

    #[test]
    fn touched_segment_never_evicted_by_its_own_touch() {
        let [a] = ids(1).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a]);
        let policy = TimedPolicy::new(LIFETIME).unwrap();
        let start = Instant::now();

        policy.touch_at(a, start, &mut target);
        policy.touch_at(a, start + Duration::from_secs(5), &mut target);
        assert!(target.evicted.is_empty());
    }

    #[test]
    fn dirty_expired_segment_stays_tracked() {
        let [a, b] = ids(2).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a, b]);
        target.set(a, |r| r.dirty = true);
        let policy = TimedPolicy::new(LIFETIME).unwrap();
        let start = Instant::now();

        policy.touch_at(a, start, &mut target);
        policy.touch_at(b, start + Duration::from_secs(1), &mut target);

        assert!(target.loaded(a));
        assert_eq!(policy.tracked(), 2);

        target.set(a, |r| r.dirty = false);
        policy.touch_at(b, start + Duration::from_secs(2), &mut target);
        assert_eq!(target.evicted, vec![a]);
    }

    #[test]
    fn fresh_copies_lifetime_only() {
        let [a] = ids(1).try_into().unwrap();
        let mut target = FakeTarget::with_loaded(&[a]);
        let policy = TimedPolicy::new(LIFETIME).unwrap();
        policy.touch(a, &mut target);

        let copy = policy.fresh();
        assert_eq!(copy.tracked(), 0);
        assert_eq!(copy.name(), "timed");

        policy.forget(a);
        assert_eq!(policy.tracked(), 0);
    }
}
