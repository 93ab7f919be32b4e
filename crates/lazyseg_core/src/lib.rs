//! # lazyseg Core
//!
//! Segmented containers whose contents are paged in and out of memory one
//! segment at a time.
//!
//! This crate provides:
//! - [`LazyList`] - an ordered sequence split into bounded segments
//! - [`LazyMap`] - a hash map split into segments owning hash ranges
//! - [`Lazy`] - the two-state reference holding a segment's payload
//! - Eviction policies deciding which clean payloads to drop
//! - Persistence collaborators that fetch and store segment payloads
//!
//! ## Paging Model
//!
//! A segment's payload is fetched from its [`PayloadStore`] on first
//! access. Every access is reported to the container's
//! [`EvictionPolicy`], which may unload other segments on the spot. Only
//! clean, unpinned segments are ever unloaded; `flush` hands dirty payloads
//! to the store and marks them clean.
//!
//! ## Example
//!
//! ```rust
//! use lazyseg_core::{Config, EvictionConfig, LazyList};
//!
//! let config = Config::for_list()
//!     .max_segment_size(100)
//!     .eviction(EvictionConfig::Recency { resident: 2 });
//! let mut list = LazyList::with_config(config).unwrap();
//!
//! list.extend(0..1_000).unwrap();
//! list.flush().unwrap();
//!
//! assert_eq!(*list.get(950).unwrap(), 950);
//! assert!(list.segments().iter().filter(|s| s.loaded).count() <= 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod eviction;
mod index;
mod lazy;
mod list;
mod manifest;
mod map;
mod persistence;
mod segment;
mod stats;
mod types;

pub use config::{
    Config, EvictionConfig, DEFAULT_LIST_RESIDENT, DEFAULT_MAP_RESIDENT, DEFAULT_MAX_SEGMENT_SIZE,
};
pub use error::{BoxedSource, CoreError, CoreResult};
pub use eviction::{EvictionPolicy, EvictionTarget, NeverPolicy, RecencyPolicy, TimedPolicy};
pub use lazy::{ClearGuard, Lazy};
pub use list::{Iter, LazyList, ListSplitter, LoadedFirstCursor, SegmentInfo};
pub use manifest::{ListManifest, ListSegmentEntry, MapManifest, MapSegmentEntry};
pub use map::{
    Entries, FixedState, IndexPosition, LazyMap, MapCursor, MapEntry, MapSegmentInfo, MapSplitter,
};
pub use persistence::{BackedPayloads, MemoryPayloads, PayloadStore};
pub use stats::{SegmentStats, StatsSnapshot};
pub use types::{Residency, SegmentId, HASH_MAX, HASH_MIN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
