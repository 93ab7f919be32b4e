//! Test fixtures and store helpers.
//!
//! Provides payload stores that record their traffic or fail on request,
//! an identity hasher, and temporary file stores.

use lazyseg_core::{
    BackedPayloads, Config, CoreError, CoreResult, EvictionConfig, MemoryPayloads, PayloadStore,
    SegmentId,
};
use lazyseg_storage::FileStore;
use parking_lot::Mutex;
use std::hash::{BuildHasherDefault, Hasher};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// One call a [`RecordingStore`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A payload was fetched.
    Fetch(SegmentId),
    /// A payload was persisted.
    Persist(SegmentId),
    /// An in-memory payload was dropped.
    Discard(SegmentId),
    /// A segment was destroyed.
    Release(SegmentId),
}

/// In-memory payload store that logs every call.
///
/// Clones share the copies and the log.
#[derive(Debug)]
pub struct RecordingStore<P> {
    inner: MemoryPayloads<P>,
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl<P> RecordingStore<P> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: MemoryPayloads::new(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the observed calls in order.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().clone()
    }

    /// Forgets the observed calls.
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Number of fetches.
    pub fn fetches(&self) -> usize {
        self.count(|event| matches!(event, StoreEvent::Fetch(_)))
    }

    /// Number of persists.
    pub fn persists(&self) -> usize {
        self.count(|event| matches!(event, StoreEvent::Persist(_)))
    }

    /// Number of discard notifications.
    pub fn discards(&self) -> usize {
        self.count(|event| matches!(event, StoreEvent::Discard(_)))
    }

    /// Number of release notifications.
    pub fn releases(&self) -> usize {
        self.count(|event| matches!(event, StoreEvent::Release(_)))
    }

    fn count(&self, filter: impl Fn(&StoreEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| filter(event)).count()
    }

    fn record(&self, event: StoreEvent) {
        self.events.lock().push(event);
    }
}

impl<P> Default for RecordingStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for RecordingStore<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

impl<P: Clone> PayloadStore<P> for RecordingStore<P> {
    fn fetch(&self, id: SegmentId) -> CoreResult<P> {
        self.record(StoreEvent::Fetch(id));
        self.inner.fetch(id)
    }

    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()> {
        self.record(StoreEvent::Persist(id));
        self.inner.persist(id, payload)
    }

    fn discard(&self, id: SegmentId) {
        self.record(StoreEvent::Discard(id));
    }

    fn release(&self, id: SegmentId) -> CoreResult<()> {
        self.record(StoreEvent::Release(id));
        self.inner.release(id)
    }
}

/// In-memory payload store whose fetches and persists can be made to fail.
///
/// Clones share the copies and the switches.
#[derive(Debug)]
pub struct FailingStore<P> {
    inner: MemoryPayloads<P>,
    fail_fetch: Arc<AtomicBool>,
    fail_persist: Arc<AtomicBool>,
}

impl<P> FailingStore<P> {
    /// Creates a store that does not fail yet.
    pub fn new() -> Self {
        Self {
            inner: MemoryPayloads::new(),
            fail_fetch: Arc::new(AtomicBool::new(false)),
            fail_persist: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes every following fetch fail, or succeed again.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Makes every following persist fail, or succeed again.
    pub fn fail_persists(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

impl<P> Default for FailingStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for FailingStore<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            fail_fetch: Arc::clone(&self.fail_fetch),
            fail_persist: Arc::clone(&self.fail_persist),
        }
    }
}

impl<P: Clone> PayloadStore<P> for FailingStore<P> {
    fn fetch(&self, id: SegmentId) -> CoreResult<P> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(CoreError::persistence(
                id,
                io::Error::other("injected fetch failure"),
            ));
        }
        self.inner.fetch(id)
    }

    fn persist(&self, id: SegmentId, payload: &P) -> CoreResult<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(CoreError::persistence(
                id,
                io::Error::other("injected persist failure"),
            ));
        }
        self.inner.persist(id, payload)
    }

    fn release(&self, id: SegmentId) -> CoreResult<()> {
        self.inner.release(id)
    }
}

/// Hasher mapping integer keys to themselves.
///
/// With it, map keys below 65536 get their own value as hash, which makes
/// segment boundaries easy to predict.
#[derive(Debug, Default)]
pub struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 << 8) | u64::from(*byte);
        }
    }

    fn write_i32(&mut self, value: i32) {
        self.0 = u64::from(value as u32);
    }

    fn write_u32(&mut self, value: u32) {
        self.0 = u64::from(value);
    }
}

/// Builder for [`IdentityHasher`].
pub type IdentityState = BuildHasherDefault<IdentityHasher>;

/// A file store in a temporary directory.
pub struct TempFileStore {
    /// The store, shared so containers and the test can both hold it.
    pub store: Arc<FileStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    pub dir: TempDir,
}

impl TempFileStore {
    /// Opens a file store in a fresh temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(dir.path()).expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            dir,
        }
    }

    /// Returns a payload store over the file store.
    pub fn payloads(&self) -> BackedPayloads<FileStore> {
        BackedPayloads::shared(Arc::clone(&self.store))
    }

    /// Closes the store and opens the same directory again.
    ///
    /// Every container using the store must be dropped first, or the
    /// directory lock is still held.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        drop(store);
        let store = FileStore::open(dir.path()).expect("Failed to reopen file store");
        Self {
            store: Arc::new(store),
            dir,
        }
    }
}

impl Default for TempFileStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with a small segment size and no eviction.
pub fn small_config(max_segment_size: usize) -> Config {
    Config::for_list()
        .max_segment_size(max_segment_size)
        .eviction(EvictionConfig::Never)
}

/// Configuration with a small segment size and a tight recency bound.
pub fn paging_config(max_segment_size: usize, resident: usize) -> Config {
    Config::for_list()
        .max_segment_size(max_segment_size)
        .eviction(EvictionConfig::Recency { resident })
}
