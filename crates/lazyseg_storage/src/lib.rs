//! # lazyseg storage
//!
//! Keyed blob stores that hold the persisted payloads of lazyseg segments.
//!
//! Stores are **opaque**: a blob is a byte string addressed by a 16-byte
//! key. They know nothing about segments, elements or hash ranges; the core
//! crate owns every interpretation of the bytes.
//!
//! ## Design Principles
//!
//! - A store maps `key -> latest bytes`; `remove` drops the mapping
//! - All methods take `&self` so one store can back many containers
//! - Must be `Send + Sync`; implementations lock internally
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests and volatile containers
//! - [`FileStore`] - Append-only, checksummed blob log in a locked directory
//!
//! ## Example
//!
//! ```rust
//! use lazyseg_storage::{InMemoryStore, SegmentStore};
//!
//! let store = InMemoryStore::new();
//! store.write(&[7; 16], b"payload").unwrap();
//! assert_eq!(store.read(&[7; 16]).unwrap().as_deref(), Some(&b"payload"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod record;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use record::{compute_crc32, BlobRecord, BlobRecordFlags};
pub use store::{BlobKey, SegmentStore};
