//! File-based segment store.
//!
//! Directory layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK        # Advisory lock for single-process access
//! └─ blobs.log   # Append-only log of blob records
//! ```
//!
//! Every `write` appends a put record and every `remove` appends a
//! tombstone. An in-memory index maps each key to its latest live record and
//! is rebuilt by scanning the log on open.

use crate::error::{StorageError, StorageResult};
use crate::record::BlobRecord;
use crate::store::{BlobKey, SegmentStore};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "blobs.log";
const LOG_TEMP: &str = "blobs.log.tmp";

/// Location of a live record inside the log.
#[derive(Debug, Clone, Copy)]
struct RecordSlot {
    offset: u64,
    record_len: usize,
}

#[derive(Debug)]
struct LogState {
    file: File,
    size: u64,
    index: HashMap<BlobKey, RecordSlot>,
}

/// A segment store backed by a checksummed append-only log.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Recovery
///
/// A trailing record cut short by a crash is treated as end-of-log and
/// truncated away on open. A complete record whose checksum does not match
/// fails the open with [`StorageError::ChecksumMismatch`].
///
/// # Example
///
/// ```no_run
/// use lazyseg_storage::{FileStore, SegmentStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("segments")).unwrap();
/// store.write(&[1; 16], b"payload").unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<LogState>,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists and is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - The log contains a corrupted record
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StorageError::corrupted(format!(
                "store path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        let state = Self::load_log(&path.join(LOG_FILE))?;
        debug!(
            path = %path.display(),
            blobs = state.index.len(),
            log_size = state.size,
            "opened file store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size of the blob log in bytes.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.state.lock().size
    }

    /// Returns the keys of all live blobs, sorted.
    #[must_use]
    pub fn live_keys(&self) -> Vec<BlobKey> {
        let mut keys: Vec<BlobKey> = self.state.lock().index.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Writes every live blob into a fresh store at `target`.
    ///
    /// Superseded records and tombstones are left behind. The returned store
    /// holds the lock on `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` cannot be opened or a blob cannot be
    /// copied.
    pub fn compact_into(&self, target: &Path) -> StorageResult<Self> {
        let compacted = Self::open(target)?;
        for key in self.live_keys() {
            if let Some(data) = self.read(&key)? {
                compacted.write(&key, &data)?;
            }
        }
        compacted.sync()?;
        debug!(
            from = %self.path.display(),
            to = %target.display(),
            blobs = compacted.len(),
            "compacted file store"
        );
        Ok(compacted)
    }

    /// Rewrites the log in place so it holds only live blobs.
    ///
    /// Uses the write-then-rename pattern: live records go to a temporary
    /// file which is synced and renamed over the log, then the directory is
    /// synced.
    ///
    /// Returns the number of bytes reclaimed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn compact(&self) -> StorageResult<u64> {
        let mut state = self.state.lock();
        let before = state.size;

        let mut keys: Vec<BlobKey> = state.index.keys().copied().collect();
        keys.sort_unstable();

        let temp_path = self.path.join(LOG_TEMP);
        let mut temp = File::create(&temp_path)?;
        let mut index = HashMap::with_capacity(keys.len());
        let mut size = 0u64;
        for key in keys {
            let Some(slot) = state.index.get(&key).copied() else {
                continue;
            };
            let record = Self::read_record(&mut state.file, slot)?;
            let encoded = record.encode();
            temp.write_all(&encoded)?;
            index.insert(
                key,
                RecordSlot {
                    offset: size,
                    record_len: encoded.len(),
                },
            );
            size += encoded.len() as u64;
        }
        temp.sync_all()?;
        drop(temp);

        let log_path = self.path.join(LOG_FILE);
        fs::rename(&temp_path, &log_path)?;
        self.sync_directory()?;

        state.file = OpenOptions::new().read(true).write(true).open(&log_path)?;
        state.size = size;
        state.index = index;

        let reclaimed = before.saturating_sub(size);
        debug!(reclaimed, log_size = size, "compacted blob log in place");
        Ok(reclaimed)
    }

    fn load_log(log_path: &Path) -> StorageResult<LogState> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(log_path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut index = HashMap::new();
        let mut offset = 0usize;
        while offset < data.len() {
            let rest = &data[offset..];
            let record_len = match BlobRecord::peek_len(rest) {
                Some(len) if len <= rest.len() => len,
                _ => {
                    warn!(
                        offset,
                        trailing = rest.len(),
                        "truncating torn record at end of blob log"
                    );
                    break;
                }
            };

            let record = BlobRecord::decode(&rest[..record_len])?;
            if record.is_tombstone() {
                index.remove(&record.key);
            } else {
                index.insert(
                    record.key,
                    RecordSlot {
                        offset: offset as u64,
                        record_len,
                    },
                );
            }
            offset += record_len;
        }

        let size = offset as u64;
        if size < data.len() as u64 {
            file.set_len(size)?;
            file.sync_all()?;
        }

        Ok(LogState { file, size, index })
    }

    fn read_record(file: &mut File, slot: RecordSlot) -> StorageResult<BlobRecord> {
        let size = file.metadata()?.len();
        let end = slot.offset.saturating_add(slot.record_len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd {
                offset: slot.offset,
                len: slot.record_len,
                size,
            });
        }

        file.seek(SeekFrom::Start(slot.offset))?;
        let mut buffer = vec![0u8; slot.record_len];
        file.read_exact(&mut buffer)?;
        BlobRecord::decode(&buffer)
    }

    fn append(state: &mut LogState, record: &BlobRecord) -> StorageResult<RecordSlot> {
        let encoded = record.encode();
        state.file.seek(SeekFrom::End(0))?;
        state.file.write_all(&encoded)?;

        let slot = RecordSlot {
            offset: state.size,
            record_len: encoded.len(),
        };
        state.size += encoded.len() as u64;
        Ok(slot)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl SegmentStore for FileStore {
    fn read(&self, key: &BlobKey) -> StorageResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let Some(slot) = state.index.get(key).copied() else {
            return Ok(None);
        };
        let record = Self::read_record(&mut state.file, slot)?;
        if record.key != *key {
            return Err(StorageError::corrupted(format!(
                "index points at a record for another key at offset {}",
                slot.offset
            )));
        }
        Ok(Some(record.payload))
    }

    fn write(&self, key: &BlobKey, data: &[u8]) -> StorageResult<()> {
        let mut state = self.state.lock();
        let slot = Self::append(&mut state, &BlobRecord::put(*key, data.to_vec()))?;
        state.index.insert(*key, slot);
        Ok(())
    }

    fn remove(&self, key: &BlobKey) -> StorageResult<bool> {
        let mut state = self.state.lock();
        if !state.index.contains_key(key) {
            return Ok(false);
        }
        Self::append(&mut state, &BlobRecord::tombstone(*key))?;
        state.index.remove(key);
        Ok(true)
    }

    fn contains(&self, key: &BlobKey) -> bool {
        self.state.lock().index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    fn flush(&self) -> StorageResult<()> {
        self.state.lock().file.flush()?;
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        self.state.lock().file.sync_all()?;
        Ok(())
    }
}
