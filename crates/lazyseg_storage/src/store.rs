//! Segment store trait definition.

use crate::error::StorageResult;

/// Key addressing one blob. The core uses the 16 bytes of a segment's UUID.
pub type BlobKey = [u8; 16];

/// A keyed blob store holding persisted segment payloads.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the latest `write` for that key
/// - `read` returns `None` for keys never written or since removed
/// - `flush` pushes accepted writes to the OS, `sync` makes them durable
/// - Implementations must be `Send + Sync` and lock internally
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait SegmentStore: Send + Sync {
    /// Reads the latest bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record is unreadable or corrupted.
    fn read(&self, key: &BlobKey) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `data` under `key`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write(&self, key: &BlobKey, data: &[u8]) -> StorageResult<()>;

    /// Removes the blob stored under `key`.
    ///
    /// Returns `true` if a blob was present.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, key: &BlobKey) -> StorageResult<bool>;

    /// Returns whether a blob is stored under `key`.
    fn contains(&self, key: &BlobKey) -> bool;

    /// Returns the number of live blobs.
    fn len(&self) -> usize;

    /// Returns whether the store holds no blobs.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;
}
