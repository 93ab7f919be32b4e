//! Policy that keeps every segment resident.

use super::{EvictionPolicy, EvictionTarget};
use crate::types::SegmentId;

/// Evicts nothing. Useful for small containers and deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPolicy;

impl EvictionPolicy for NeverPolicy {
    fn touch(&self, _id: SegmentId, _target: &mut dyn EvictionTarget) {}

    fn forget(&self, _id: SegmentId) {}

    fn fresh(&self) -> Box<dyn EvictionPolicy> {
        Box::new(Self)
    }

    fn tracked(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "never"
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn never_evicts() {
        let segments = ids(4);
        let mut target = FakeTarget::with_loaded(&segments);
        let policy = NeverPolicy;

        for id in &segments {
            policy.touch(*id, &mut target);
        }

        assert!(target.evicted.is_empty());
        assert_eq!(policy.tracked(), 0);
    }
}
