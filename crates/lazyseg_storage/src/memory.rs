//! In-memory segment store for testing.

use crate::error::StorageResult;
use crate::store::{BlobKey, SegmentStore};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory segment store.
///
/// Blobs live in a hash map guarded by a read-write lock. Suitable for
/// unit tests and for containers whose unloaded segments need not survive
/// the process.
///
/// # Example
///
/// ```rust
/// use lazyseg_storage::{InMemoryStore, SegmentStore};
///
/// let store = InMemoryStore::new();
/// store.write(&[1; 16], b"abc").unwrap();
/// assert!(store.contains(&[1; 16]));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blobs: RwLock<HashMap<BlobKey, Vec<u8>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys of all stored blobs, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<BlobKey> {
        let mut keys: Vec<BlobKey> = self.blobs.read().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the total number of payload bytes held.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.blobs.read().values().map(Vec::len).sum()
    }

    /// Drops every blob.
    pub fn clear(&self) {
        self.blobs.write().clear();
    }
}

impl SegmentStore for InMemoryStore {
    fn read(&self, key: &BlobKey) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn write(&self, key: &BlobKey, data: &[u8]) -> StorageResult<()> {
        self.blobs.write().insert(*key, data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &BlobKey) -> StorageResult<bool> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn contains(&self, key: &BlobKey) -> bool {
        self.blobs.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.blobs.read().len()
    }

    fn flush(&self) -> StorageResult<()> {
        // Nothing buffered
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        Ok(())
    }
}
