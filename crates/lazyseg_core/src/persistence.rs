//! Persistence collaborators.
//!
//! The core asks a [`PayloadStore`] for two things: the payload of a segment
//! that is not in memory, and a place to hand dirty payloads on `flush`.
//! How bytes become durable is the store's business.
//!
//! - [`MemoryPayloads`] keeps persisted copies as values, without encoding
//! - [`BackedPayloads`] encodes payloads with `lazyseg_codec` and writes them
//!   to any [`SegmentStore`]

use crate::error::{CoreError, CoreResult};
use crate::types::SegmentId;
use lazyseg_codec::{from_cbor, to_cbor};
use lazyseg_storage::SegmentStore;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Store of segment payloads keyed by segment identity.
pub trait PayloadStore<P> {
    /// Fetches the persisted payload of `id`. Blocks until it is available.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceUnavailable` if the payload cannot be produced.
    fn fetch(&self, id: SegmentId) -> CoreResult<P>;

    /// Stores `payload` as the persisted state of `id`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceUnavailable` if the payload cannot be stored.
    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()>;

    /// Notification that the in-memory payload of `id` was dropped.
    fn discard(&self, _id: SegmentId) {}

    /// Notification that segment `id` was destroyed for good.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceUnavailable` if the persisted copy could not be
    /// removed. Containers log this and carry on.
    fn release(&self, _id: SegmentId) -> CoreResult<()> {
        Ok(())
    }
}

impl<P, T> PayloadStore<P> for Arc<T>
where
    T: PayloadStore<P> + ?Sized,
{
    fn fetch(&self, id: SegmentId) -> CoreResult<P> {
        (**self).fetch(id)
    }

    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()> {
        (**self).persist(id, payload)
    }

    fn discard(&self, id: SegmentId) {
        (**self).discard(id);
    }

    fn release(&self, id: SegmentId) -> CoreResult<()> {
        (**self).release(id)
    }
}

/// Payload store keeping persisted copies in memory.
///
/// Clones share the same copies, so a cloned container can use a clone of
/// its source's store.
#[derive(Debug)]
pub struct MemoryPayloads<P> {
    copies: Arc<RwLock<HashMap<SegmentId, P>>>,
}

impl<P> MemoryPayloads<P> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            copies: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the number of persisted payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.copies.read().len()
    }

    /// Returns whether nothing is persisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether a payload is persisted for `id`.
    #[must_use]
    pub fn contains(&self, id: SegmentId) -> bool {
        self.copies.read().contains_key(&id)
    }
}

impl<P> Default for MemoryPayloads<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for MemoryPayloads<P> {
    fn clone(&self) -> Self {
        Self {
            copies: Arc::clone(&self.copies),
        }
    }
}

impl<P: Clone> PayloadStore<P> for MemoryPayloads<P> {
    fn fetch(&self, id: SegmentId) -> CoreResult<P> {
        self.copies
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::persistence(id, "no persisted payload"))
    }

    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()> {
        self.copies.write().insert(id, payload.clone());
        Ok(())
    }

    fn release(&self, id: SegmentId) -> CoreResult<()> {
        self.copies.write().remove(&id);
        Ok(())
    }
}

/// Payload store encoding payloads into a [`SegmentStore`].
///
/// The segment's UUID bytes are the blob key.
#[derive(Debug)]
pub struct BackedPayloads<S> {
    store: Arc<S>,
}

impl<S: SegmentStore> BackedPayloads<S> {
    /// Wraps a byte store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Wraps a byte store shared with other owners.
    #[must_use]
    pub fn shared(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying byte store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<S> Clone for BackedPayloads<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<P, S> PayloadStore<P> for BackedPayloads<S>
where
    P: Serialize + DeserializeOwned,
    S: SegmentStore,
{
    fn fetch(&self, id: SegmentId) -> CoreResult<P> {
        let bytes = self
            .store
            .read(id.as_bytes())
            .map_err(|e| CoreError::persistence(id, e))?
            .ok_or_else(|| CoreError::persistence(id, "no persisted payload"))?;
        from_cbor(&bytes).map_err(|e| CoreError::persistence(id, e))
    }

    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()> {
        let bytes = to_cbor(payload).map_err(|e| CoreError::persistence(id, e))?;
        self.store
            .write(id.as_bytes(), &bytes)
            .map_err(|e| CoreError::persistence(id, e))
    }

    fn release(&self, id: SegmentId) -> CoreResult<()> {
        self.store
            .remove(id.as_bytes())
            .map(|_| ())
            .map_err(|e| CoreError::persistence(id, e))
    }
}
