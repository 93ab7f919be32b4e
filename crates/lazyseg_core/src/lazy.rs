//! Lazy references to segment payloads.

use crate::error::CoreResult;
use crate::persistence::PayloadStore;
use crate::types::SegmentId;

/// Capability a lazy reference queries before discarding its payload.
pub trait ClearGuard {
    /// Returns whether the payload may be dropped from memory.
    fn allow_clear(&self) -> bool;
}

/// A two-state handle around a payload: unloaded or loaded.
///
/// The first [`load`](Self::load) after construction or after a
/// [`clear`](Self::clear) fetches the payload from the store; later loads
/// return the cached value. The guard is passed at the call site because the
/// segment that owns the reference is also its guard.
#[derive(Debug)]
pub struct Lazy<P> {
    id: SegmentId,
    value: Option<P>,
}

impl<P> Lazy<P> {
    /// Creates a reference whose payload lives only in the store.
    #[must_use]
    pub const fn unloaded(id: SegmentId) -> Self {
        Self { id, value: None }
    }

    /// Creates a reference holding `value`.
    #[must_use]
    pub const fn loaded(id: SegmentId, value: P) -> Self {
        Self {
            id,
            value: Some(value),
        }
    }

    /// Returns the segment this payload belongs to.
    #[must_use]
    pub const fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns whether the payload is in memory.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the payload, fetching it from `store` if needed.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceUnavailable` if the fetch fails. The reference
    /// stays unloaded in that case.
    pub fn load<S>(&mut self, store: &S) -> CoreResult<&mut P>
    where
        S: PayloadStore<P> + ?Sized,
    {
        let value = match self.value.take() {
            Some(value) => value,
            None => store.fetch(self.id)?,
        };
        Ok(self.value.insert(value))
    }

    /// Returns the payload if it is in memory.
    #[must_use]
    pub fn peek(&self) -> Option<&P> {
        self.value.as_ref()
    }

    /// Returns the payload mutably if it is in memory.
    pub fn peek_mut(&mut self) -> Option<&mut P> {
        self.value.as_mut()
    }

    /// Moves the payload out, leaving the reference unloaded.
    pub fn take(&mut self) -> Option<P> {
        self.value.take()
    }

    /// Drops the cached payload if `guard` allows it and tells the store.
    ///
    /// Returns whether a payload was dropped.
    pub fn clear<S>(&mut self, guard: &dyn ClearGuard, store: &S) -> bool
    where
        S: PayloadStore<P> + ?Sized,
    {
        if self.value.is_none() || !guard.allow_clear() {
            return false;
        }
        self.value = None;
        store.discard(self.id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPayloads;

    struct Allow(bool);

    impl ClearGuard for Allow {
        fn allow_clear(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn load_fetches_once() {
        let id = SegmentId::new();
        let store = MemoryPayloads::new();
        store.persist(id, &vec![1, 2]).unwrap();

        let mut lazy: Lazy<Vec<i32>> = Lazy::unloaded(id);
        assert!(!lazy.is_loaded());
        lazy.load(&store).unwrap().push(3);
        assert_eq!(lazy.load(&store).unwrap(), &vec![1, 2, 3]);
        assert_eq!(store.fetch(id).unwrap(), vec![1, 2]);
    }

    #[test]
    fn failed_load_stays_unloaded() {
        let store = MemoryPayloads::<Vec<i32>>::new();
        let mut lazy = Lazy::unloaded(SegmentId::new());

        assert!(lazy.load(&store).is_err());
        assert!(!lazy.is_loaded());
    }

    #[test]
    fn clear_respects_guard() {
        let store = MemoryPayloads::new();
        let mut lazy = Lazy::loaded(SegmentId::new(), vec![1]);

        assert!(!lazy.clear(&Allow(false), &store));
        assert!(lazy.is_loaded());
        assert!(lazy.clear(&Allow(true), &store));
        assert!(!lazy.is_loaded());
        assert!(!lazy.clear(&Allow(true), &store));
    }
}
