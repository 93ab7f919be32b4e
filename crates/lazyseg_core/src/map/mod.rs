//! Segmented, lazily-paged hash map.
//!
//! Entries are ordered by a 32-bit spread hash. Each segment owns a range of
//! the hash domain; together the ranges partition `[HASH_MIN, HASH_MAX)`
//! without gaps. A segment that outgrows the target size splits at the
//! midpoint of its present hashes; a segment that empties hands its range to
//! a neighbour.
//!
//! ```rust
//! use lazyseg_core::{Config, LazyMap};
//!
//! let mut map = LazyMap::with_config(Config::for_map().max_segment_size(4)).unwrap();
//! for n in 0..20 {
//!     map.put(format!("key-{n}"), n).unwrap();
//! }
//!
//! assert_eq!(map.len(), 20);
//! assert_eq!(map.get("key-7").unwrap(), Some(&7));
//! assert_eq!(map.put("key-7".to_string(), 70).unwrap(), Some(7));
//! assert!(map.segment_count() > 1);
//! map.verify().unwrap();
//! ```

mod hash;
mod iter;
mod split;

pub use hash::FixedState;
pub use iter::{Entries, MapCursor};
pub use split::MapSplitter;

use crate::config::{Config, DEFAULT_MAP_RESIDENT, DEFAULT_MAX_SEGMENT_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::eviction::{EvictionPolicy, RecencyPolicy};
use crate::index::{segment_for_hash, HashSpan};
use crate::manifest::{MapManifest, MapSegmentEntry};
use crate::persistence::{MemoryPayloads, PayloadStore};
use crate::segment::{Segment, SegmentTable};
use crate::stats::SegmentStats;
use crate::types::{SegmentId, HASH_MAX, HASH_MIN};
use hash::spread;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use tracing::{debug, warn};

/// One stored mapping with its cached hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry<K, V> {
    hash: i32,
    key: K,
    value: V,
}

impl<K, V> MapEntry<K, V> {
    /// Returns the spread hash the entry is ordered by.
    #[must_use]
    pub fn hash(&self) -> i32 {
        self.hash
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Splits the entry into key and value.
    #[must_use]
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Where an ordinal position falls among the map's segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPosition {
    /// Index of the owning segment.
    pub segment_index: usize,
    /// Position inside that segment.
    pub local_index: usize,
    /// Ordinal of the segment's first entry.
    pub segment_start: usize,
    /// Entry count of the segment.
    pub segment_len: usize,
}

/// Introspection record for one map segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapSegmentInfo {
    /// Segment identity.
    pub id: SegmentId,
    /// Lowest hash owned, inclusive.
    pub min_hash: i64,
    /// Highest hash owned, exclusive.
    pub max_hash: i64,
    /// Entry count.
    pub len: usize,
    /// Payload is in memory.
    pub loaded: bool,
    /// Mutated since last flush.
    pub dirty: bool,
    /// Held by a traversal.
    pub pinned: bool,
}

/// A hash map whose entries are paged in segment by segment.
///
/// Lookups take `&mut self` because any access may page a segment in and
/// evict others.
pub struct LazyMap<K, V, S = MemoryPayloads<Vec<MapEntry<K, V>>>, H = FixedState> {
    table: SegmentTable<MapEntry<K, V>, HashSpan, S>,
    len: usize,
    max_segment_size: usize,
    generation: u64,
    hasher: H,
}

impl<K: Hash + Eq + Clone, V: Clone> LazyMap<K, V> {
    /// Creates an empty map with default target size and eviction, keeping
    /// persisted payloads in memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: SegmentTable::new(
                Box::new(RecencyPolicy::preset(DEFAULT_MAP_RESIDENT)),
                MemoryPayloads::new(),
            ),
            len: 0,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            generation: 0,
            hasher: FixedState::default(),
        }
    }

    /// Creates an empty map from `config`, keeping persisted payloads in
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid.
    pub fn with_config(config: Config) -> CoreResult<Self> {
        Self::with_store(config, MemoryPayloads::new())
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Default for LazyMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, H> LazyMap<K, V, S, H>
where
    K: Hash + Eq,
    S: PayloadStore<Vec<MapEntry<K, V>>>,
    H: BuildHasher,
{
    /// Creates an empty map over `store`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid.
    pub fn with_store(config: Config, store: S) -> CoreResult<Self>
    where
        H: Default,
    {
        Self::with_hasher(config, store, H::default())
    }

    /// Creates an empty map over `store` hashing keys with `hasher`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid.
    pub fn with_hasher(config: Config, store: S, hasher: H) -> CoreResult<Self> {
        config.validate_map()?;
        let policy = config.eviction.build()?;
        Ok(Self::with_policy(config.max_segment_size, policy, store, hasher))
    }

    /// Creates an empty map with an explicit policy instance.
    ///
    /// A `max_segment_size` of zero makes every insert attempt a split.
    pub fn with_policy(
        max_segment_size: usize,
        policy: Box<dyn EvictionPolicy>,
        store: S,
        hasher: H,
    ) -> Self {
        Self {
            table: SegmentTable::new(policy, store),
            len: 0,
            max_segment_size,
            generation: 0,
            hasher,
        }
    }

    /// Reopens a flushed map. Every segment starts unloaded and clean.
    ///
    /// `hasher` must hash keys the way the map that wrote the manifest did.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the manifest is inconsistent or
    /// was written with a different hasher.
    pub fn open(
        manifest: &MapManifest,
        store: S,
        policy: Box<dyn EvictionPolicy>,
        hasher: H,
    ) -> CoreResult<Self> {
        manifest.validate()?;
        let fingerprint = hash::fingerprint(&hasher);
        if manifest.hasher_fingerprint != fingerprint {
            return Err(CoreError::invalid_configuration(format!(
                "map manifest was written with hasher {:#018x}, not {fingerprint:#018x}",
                manifest.hasher_fingerprint
            )));
        }

        let segments: Vec<_> = manifest
            .segments
            .iter()
            .map(|entry| {
                Segment::restored(
                    entry.id,
                    entry.len,
                    HashSpan {
                        min: entry.min_hash,
                        max: entry.max_hash,
                    },
                )
            })
            .collect();
        let len = manifest.len();
        debug!(segments = segments.len(), len, "opened map from manifest");

        Ok(Self {
            table: SegmentTable::with_segments(segments, policy, store),
            len,
            max_segment_size: manifest.max_segment_size,
            generation: 0,
            hasher,
        })
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the target segment size.
    #[must_use]
    pub fn max_segment_size(&self) -> usize {
        self.max_segment_size
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.table.count()
    }

    /// Returns the structural change counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns paging statistics.
    #[must_use]
    pub fn stats(&self) -> &SegmentStats {
        &self.table.stats
    }

    /// Returns the eviction policy.
    #[must_use]
    pub fn policy(&self) -> &dyn EvictionPolicy {
        self.table.policy.as_ref()
    }

    /// Returns the payload store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.table.store
    }

    /// Returns the hasher builder.
    #[must_use]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns the spread hash of `key`.
    pub fn hash_of<Q>(&self, key: &Q) -> i32
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        spread(&self.hasher, key)
    }

    /// Describes every segment without paging anything in.
    #[must_use]
    pub fn segments(&self) -> Vec<MapSegmentInfo> {
        self.table
            .segments
            .iter()
            .map(|segment| {
                let residency = segment.residency();
                MapSegmentInfo {
                    id: segment.id,
                    min_hash: segment.span.min,
                    max_hash: segment.span.max,
                    len: segment.len,
                    loaded: residency.loaded,
                    dirty: residency.dirty,
                    pinned: residency.pinned,
                }
            })
            .collect()
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn get<Q>(&mut self, key: &Q) -> CoreResult<Option<&V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some((s, i)) = self.find(key)? else {
            return Ok(None);
        };
        let items = self.table.page_in(s)?;
        Ok(items.get(i).map(|entry| &entry.value))
    }

    /// Returns the value stored under `key` for modification. The owning
    /// segment becomes dirty only if the key is present.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn get_mut<Q>(&mut self, key: &Q) -> CoreResult<Option<&mut V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some((s, i)) = self.find(key)? else {
            return Ok(None);
        };
        let items = self.table.page_in_for_write(s)?;
        Ok(items.get_mut(i).map(|entry| &mut entry.value))
    }

    /// Returns whether `key` is present.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn contains_key<Q>(&mut self, key: &Q) -> CoreResult<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.find(key)?.is_some())
    }

    /// Returns whether any entry holds `value`. Pages in every segment
    /// until a match is found.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn contains_value(&mut self, value: &V) -> CoreResult<bool>
    where
        V: PartialEq,
    {
        for s in 0..self.table.count() {
            if self.table.page_in(s)?.iter().any(|entry| entry.value == *value) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Stores `value` under `key`, returning the value it replaced.
    ///
    /// A new key goes to the end of its equal-hash run. If the segment then
    /// exceeds the target size it splits at the midpoint of its lowest and
    /// highest hash, unless every split point would leave a side with at
    /// most one entry.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn put(&mut self, key: K, value: V) -> CoreResult<Option<V>> {
        let hash = spread(&self.hasher, &key);
        if self.table.count() == 0 {
            self.table.create(0, Vec::new(), HashSpan::FULL);
        }

        let s = segment_for_hash(&self.table.segments, i64::from(hash))?;
        let items = self.table.page_in_for_write(s)?;
        let mut at = items.partition_point(|entry| entry.hash < hash);
        while let Some(entry) = items.get_mut(at) {
            if entry.hash != hash {
                break;
            }
            if entry.key == key {
                return Ok(Some(std::mem::replace(&mut entry.value, value)));
            }
            at += 1;
        }
        items.insert(at, MapEntry { hash, key, value });

        self.table.segments[s].len += 1;
        self.len += 1;
        self.bump();
        if self.table.segments[s].len > self.max_segment_size {
            self.split(s)?;
        }
        Ok(None)
    }

    /// Stores every pair of `pairs`. Returns how many keys were new.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in. Pairs stored before the
    /// failure stay in the map.
    pub fn put_all<I>(&mut self, pairs: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut added = 0;
        for (key, value) in pairs {
            if self.put(key, value)?.is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Alias of [`put_all`](Self::put_all).
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn extend<I>(&mut self, pairs: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.put_all(pairs)
    }

    /// Removes `key`, returning its value. A segment left empty hands its
    /// hash range to the left neighbour, or to the right one if it is the
    /// first segment.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn remove<Q>(&mut self, key: &Q) -> CoreResult<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some((s, i)) = self.find(key)? else {
            return Ok(None);
        };
        Ok(Some(self.remove_entry_at(s, i)?.value))
    }

    /// Replaces the value of an existing key, returning the old value.
    /// Absent keys are left absent.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> CoreResult<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.get_mut(key)? {
            Some(slot) => Ok(Some(std::mem::replace(slot, value))),
            None => Ok(None),
        }
    }

    /// Replaces the value of `key` only if it currently equals `expected`.
    /// Returns whether it was replaced.
    ///
    /// # Errors
    ///
    /// Returns the error of paging the covering segment in.
    pub fn replace_if<Q>(&mut self, key: &Q, expected: &V, value: V) -> CoreResult<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let Some((s, i)) = self.find(key)? else {
            return Ok(false);
        };
        if self.table.page_in(s)?.get(i).map(|entry| &entry.value) != Some(expected) {
            return Ok(false);
        }
        let items = self.table.page_in_for_write(s)?;
        if let Some(entry) = items.get_mut(i) {
            entry.value = value;
        }
        Ok(true)
    }

    /// Removes every entry and segment.
    pub fn clear(&mut self) {
        self.table.destroy_all();
        self.len = 0;
        self.bump();
    }

    /// Iterates over clones of all key/value pairs in hash order.
    pub fn iter(&mut self) -> Entries<'_, K, V, S, H, (K, V)>
    where
        K: Clone,
        V: Clone,
    {
        Entries::new(self, |entry| (entry.key.clone(), entry.value.clone()))
    }

    /// Iterates over clones of all keys in hash order.
    pub fn keys(&mut self) -> Entries<'_, K, V, S, H, K>
    where
        K: Clone,
    {
        Entries::new(self, |entry| entry.key.clone())
    }

    /// Iterates over clones of all values in hash order.
    pub fn values(&mut self) -> Entries<'_, K, V, S, H, V>
    where
        V: Clone,
    {
        Entries::new(self, |entry| entry.value.clone())
    }

    /// Returns a detached cursor over key/value pairs that can remove the
    /// pair it last returned.
    #[must_use]
    pub fn cursor(&self) -> MapCursor<K, V, (K, V)>
    where
        K: Clone,
        V: Clone,
    {
        MapCursor::new(|entry| (entry.key.clone(), entry.value.clone()))
    }

    /// Like [`cursor`](Self::cursor), yielding keys.
    #[must_use]
    pub fn key_cursor(&self) -> MapCursor<K, V, K>
    where
        K: Clone,
    {
        MapCursor::new(|entry| entry.key.clone())
    }

    /// Like [`cursor`](Self::cursor), yielding values.
    #[must_use]
    pub fn value_cursor(&self) -> MapCursor<K, V, V>
    where
        V: Clone,
    {
        MapCursor::new(|entry| entry.value.clone())
    }

    /// Returns a detached, segment-aligned splitter over key/value pairs.
    #[must_use]
    pub fn entry_splitter(&self) -> MapSplitter<K, V, (K, V)>
    where
        K: Clone,
        V: Clone,
    {
        MapSplitter::new(|entry| (entry.key.clone(), entry.value.clone()))
    }

    /// Returns a detached, segment-aligned splitter over keys.
    #[must_use]
    pub fn key_splitter(&self) -> MapSplitter<K, V, K>
    where
        K: Clone,
    {
        MapSplitter::new(|entry| entry.key.clone())
    }

    /// Returns a detached, segment-aligned splitter over values.
    #[must_use]
    pub fn value_splitter(&self) -> MapSplitter<K, V, V>
    where
        V: Clone,
    {
        MapSplitter::new(|entry| entry.value.clone())
    }

    /// Translates an ordinal in `0..len` into a segment and position, in
    /// segment order.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `ordinal >= len`.
    pub fn position_of(&self, ordinal: usize) -> CoreResult<IndexPosition> {
        if ordinal >= self.len {
            return Err(CoreError::index_out_of_range(ordinal, self.len));
        }
        let mut start = 0;
        for (segment_index, segment) in self.table.segments.iter().enumerate() {
            if ordinal < start + segment.len {
                return Ok(IndexPosition {
                    segment_index,
                    local_index: ordinal - start,
                    segment_start: start,
                    segment_len: segment.len,
                });
            }
            start += segment.len;
        }
        Err(CoreError::corrupt_index(format!(
            "segments hold {start} entries, map says {}",
            self.len
        )))
    }

    /// Persists every dirty loaded segment and marks it clean. Returns how
    /// many segments were persisted.
    ///
    /// # Errors
    ///
    /// Returns the store's error; segments persisted before it stay clean.
    pub fn flush(&mut self) -> CoreResult<usize> {
        self.table.flush()
    }

    /// Flushes and returns the manifest needed to [`open`](Self::open) the
    /// map again.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub fn checkpoint(&mut self) -> CoreResult<MapManifest> {
        self.flush()?;
        Ok(MapManifest {
            max_segment_size: self.max_segment_size,
            hasher_fingerprint: hash::fingerprint(&self.hasher),
            segments: self
                .table
                .segments
                .iter()
                .map(|segment| MapSegmentEntry {
                    id: segment.id,
                    min_hash: segment.span.min,
                    max_hash: segment.span.max,
                    len: segment.len,
                })
                .collect(),
        })
    }

    /// Copies the map into new segments sharing a clone of the store, with
    /// a fresh policy of the same configuration.
    ///
    /// # Errors
    ///
    /// Returns the error of paging a segment in.
    pub fn try_clone(&mut self) -> CoreResult<Self>
    where
        K: Clone,
        V: Clone,
        S: Clone,
        H: Clone,
    {
        Ok(Self {
            table: self.table.try_clone()?,
            len: self.len,
            max_segment_size: self.max_segment_size,
            generation: 0,
            hasher: self.hasher.clone(),
        })
    }

    /// Checks structural invariants. Only payloads already in memory are
    /// inspected.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegmentIndex` describing the first violation.
    pub fn verify(&self) -> CoreResult<()> {
        let mut expected_min = HASH_MIN;
        let mut total = 0;
        for (s, segment) in self.table.segments.iter().enumerate() {
            let span = segment.span;
            if span.min != expected_min || span.max <= span.min {
                return Err(CoreError::corrupt_index(format!(
                    "segment {s} covers [{}, {}), expected to start at {expected_min}",
                    span.min, span.max
                )));
            }
            if segment.len == 0 {
                return Err(CoreError::corrupt_index(format!("segment {s} is empty")));
            }
            if let Some(items) = segment.payload.peek() {
                let ordered = items.windows(2).all(|pair| pair[0].hash <= pair[1].hash);
                let inside = items
                    .iter()
                    .all(|entry| span.contains(i64::from(entry.hash)));
                if !ordered || !inside {
                    return Err(CoreError::corrupt_index(format!(
                        "segment {s} holds entries out of order or outside its range"
                    )));
                }
            }
            expected_min = span.max;
            total += segment.len;
        }
        if self.table.count() > 0 && expected_min != HASH_MAX {
            return Err(CoreError::corrupt_index(format!(
                "segments end at {expected_min}, expected {HASH_MAX}"
            )));
        }
        if total != self.len {
            return Err(CoreError::corrupt_index(format!(
                "segments hold {total} entries, map says {}",
                self.len
            )));
        }
        self.table.verify_payloads()
    }

    // === internals ===

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Segment index and position of `key`, if present.
    fn find<Q>(&mut self, key: &Q) -> CoreResult<Option<(usize, usize)>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.table.count() == 0 {
            return Ok(None);
        }
        let hash = spread(&self.hasher, key);
        let s = segment_for_hash(&self.table.segments, i64::from(hash))?;
        let items = self.table.page_in(s)?;
        let start = items.partition_point(|entry| entry.hash < hash);
        let found = items[start..]
            .iter()
            .take_while(|entry| entry.hash == hash)
            .position(|entry| key.eq(entry.key.borrow()));
        Ok(found.map(|offset| (s, start + offset)))
    }

    /// Removes entry `i` of segment `s`, merging the segment away if it
    /// empties.
    pub(crate) fn remove_entry_at(&mut self, s: usize, i: usize) -> CoreResult<MapEntry<K, V>> {
        let items = self.table.page_in_for_write(s)?;
        if i >= items.len() {
            return Err(CoreError::corrupt_index(format!(
                "segment {s} does not hold position {i}"
            )));
        }
        let entry = items.remove(i);

        self.table.segments[s].len -= 1;
        self.len -= 1;
        if self.table.segments[s].len == 0 {
            self.merge_empty(s);
        }
        self.bump();
        Ok(entry)
    }

    fn merge_empty(&mut self, s: usize) {
        let span = self.table.segments[s].span;
        let neighbour = if s > 0 {
            self.table.segments[s - 1].span.max = span.max;
            Some(s - 1)
        } else if self.table.count() > 1 {
            self.table.segments[1].span.min = span.min;
            Some(1)
        } else {
            None
        };

        let dropped = self.table.destroy(s);
        if let Some(neighbour) = neighbour {
            self.table.stats.record_merge();
            debug!(
                segment = %dropped.id,
                into = %self.table.segments[neighbour.min(s)].id,
                min_hash = span.min,
                max_hash = span.max,
                "merged empty segment into neighbour"
            );
        }
    }

    fn split(&mut self, s: usize) -> CoreResult<()> {
        let max = self.max_segment_size;
        let segment = &mut self.table.segments[s];
        let id = segment.id;
        let span = segment.span;
        let items = segment
            .payload
            .peek_mut()
            .ok_or_else(|| CoreError::corrupt_index(format!("segment {id} split while unloaded")))?;
        let (Some(first), Some(last)) = (items.first(), items.last()) else {
            return Ok(());
        };

        let mid = (i64::from(first.hash) + i64::from(last.hash)) / 2;
        let at = items.partition_point(|entry| i64::from(entry.hash) < mid);
        if at == 0 || at + 1 >= items.len() {
            let len = items.len();
            self.table.stats.record_degenerate_split();
            warn!(
                segment = %id,
                len,
                max,
                min_hash = span.min,
                max_hash = span.max,
                "hash collisions prevent split, segment left oversized"
            );
            return Ok(());
        }

        let tail = items.split_off(at);
        segment.len = at;
        segment.span.max = mid;
        let moved = tail.len();
        let created = self.table.create(
            s + 1,
            tail,
            HashSpan {
                min: mid,
                max: span.max,
            },
        );
        self.table.stats.record_split();
        self.bump();
        debug!(
            segment = %id,
            created = %created,
            mid_hash = mid,
            kept = at,
            moved,
            "split segment"
        );
        Ok(())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, H> fmt::Debug for LazyMap<K, V, S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for segment in &self.table.segments {
            match segment.payload.peek() {
                Some(items) => {
                    list.entries(items.iter().map(|entry| (&entry.key, &entry.value)));
                }
                None => {
                    list.entry(&format_args!("[{} unloaded]", segment.len));
                }
            }
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::hash::testing::IdentityState;
    use super::*;
    use crate::config::EvictionConfig;
    use crate::eviction::NeverPolicy;

    type IdMap = LazyMap<i32, String, MemoryPayloads<Vec<MapEntry<i32, String>>>, IdentityState>;

    fn map(max: usize) -> IdMap {
        LazyMap::with_policy(
            max,
            Box::new(NeverPolicy),
            MemoryPayloads::new(),
            IdentityState::default(),
        )
    }

    fn filled(max: usize, keys: std::ops::Range<i32>) -> IdMap {
        let mut map = map(max);
        for key in keys {
            assert!(map.put(key, format!("v{key}")).unwrap().is_none());
        }
        map
    }

    /// For every sampled hash, exactly one segment covers it.
    fn assert_partition(map: &IdMap) {
        let infos = map.segments();
        assert_eq!(infos.first().map(|info| info.min_hash), Some(HASH_MIN));
        assert_eq!(infos.last().map(|info| info.max_hash), Some(HASH_MAX));
        for pair in infos.windows(2) {
            assert_eq!(pair[0].max_hash, pair[1].min_hash);
        }
        for hash in [HASH_MIN, -1, 0, 1, 3, 5, 7, 9, 1_000, HASH_MAX - 1] {
            let covering = infos
                .iter()
                .filter(|info| info.min_hash <= hash && hash < info.max_hash)
                .count();
            assert_eq!(covering, 1, "hash {hash}");
        }
    }

    #[test]
    fn ten_keys_partition_hash_domain() {
        let mut map = filled(4, 0..10);

        assert_eq!(map.len(), 10);
        assert!(map.segment_count() > 1);
        assert_partition(&map);
        map.verify().unwrap();

        let keys: Vec<i32> = map.keys().map(Result::unwrap).collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        assert_eq!(map.stats().splits(), map.segment_count() as u64 - 1);
        assert_eq!(map.stats().degenerate_splits(), 0);
    }

    #[test]
    fn first_split_halves_at_midpoint() {
        let map = filled(4, 0..5);
        let infos = map.segments();

        assert_eq!(infos.len(), 2);
        assert_eq!((infos[0].min_hash, infos[0].max_hash), (HASH_MIN, 2));
        assert_eq!((infos[1].min_hash, infos[1].max_hash), (2, HASH_MAX));
        assert_eq!((infos[0].len, infos[1].len), (2, 3));
    }

    #[test]
    fn put_then_get() {
        let mut map = filled(4, 0..10);
        for key in 0..10 {
            assert_eq!(map.get(&key).unwrap(), Some(&format!("v{key}")));
        }
        assert_eq!(map.get(&10).unwrap(), None);

        let before = map.len();
        assert_eq!(map.put(3, "three".into()).unwrap(), Some("v3".into()));
        assert_eq!(map.len(), before);
        assert_eq!(map.get(&3).unwrap().map(String::as_str), Some("three"));
    }

    #[test]
    fn value_update_is_not_structural() {
        let mut map = filled(4, 0..6);
        let generation = map.generation();

        map.put(1, "x".into()).unwrap();
        map.replace(&2, "y".into()).unwrap();
        assert!(map.replace_if(&3, &"v3".into(), "z".into()).unwrap());
        *map.get_mut(&4).unwrap().unwrap() = "w".into();

        assert_eq!(map.generation(), generation);
    }

    #[test]
    fn emptied_segment_merges_into_left_neighbour() {
        let mut map = filled(4, 0..5);
        let right = map.segments()[1];

        for key in 2..5 {
            map.remove(&key).unwrap();
        }

        let infos = map.segments();
        assert_eq!(infos.len(), 1);
        assert_eq!((infos[0].min_hash, infos[0].max_hash), (HASH_MIN, HASH_MAX));
        assert_ne!(infos[0].id, right.id);
        assert_eq!(map.stats().merges(), 1);
        map.verify().unwrap();
    }

    #[test]
    fn emptied_first_segment_merges_into_right_neighbour() {
        let mut map = filled(4, 0..5);
        let right = map.segments()[1];

        map.remove(&0).unwrap();
        map.remove(&1).unwrap();

        let infos = map.segments();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, right.id);
        assert_eq!((infos[0].min_hash, infos[0].max_hash), (HASH_MIN, HASH_MAX));
        assert_partition(&map);
    }

    #[test]
    fn removals_keep_partition() {
        let mut map = filled(4, 0..10);
        for key in [4, 0, 9, 5, 1, 8] {
            assert_eq!(map.remove(&key).unwrap(), Some(format!("v{key}")));
            assert_partition(&map);
            map.verify().unwrap();
        }
        assert_eq!(map.remove(&4).unwrap(), None);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn last_entry_drops_last_segment() {
        let mut map = filled(4, 0..1);
        map.remove(&0).unwrap();
        assert_eq!(map.segment_count(), 0);
        assert!(map.is_empty());
        assert_eq!(map.get(&0).unwrap(), None);

        map.put(7, "again".into()).unwrap();
        assert_partition(&map);
    }

    #[test]
    fn colliding_keys_leave_segment_oversized() {
        let mut map: LazyMap<i32, i32, MemoryPayloads<Vec<MapEntry<i32, i32>>>, _> =
            LazyMap::with_policy(
                2,
                Box::new(NeverPolicy),
                MemoryPayloads::new(),
                CollidingState,
            );
        for key in 0..6 {
            map.put(key, key).unwrap();
        }

        assert_eq!(map.segment_count(), 1);
        assert_eq!(map.segments()[0].len, 6);
        assert!(map.stats().degenerate_splits() > 0);
        for key in 0..6 {
            assert_eq!(map.get(&key).unwrap(), Some(&key));
        }
        assert_eq!(map.remove(&3).unwrap(), Some(3));
        assert_eq!(map.iter().count(), 5);
    }

    #[test]
    fn zero_target_splits_on_every_insert() {
        let mut map = filled(0, 0..8);
        assert!(map.segment_count() >= 3);
        map.verify().unwrap();
        assert_eq!(map.keys().map(Result::unwrap).collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn contains_checks() {
        let mut map = filled(4, 0..6);
        assert!(map.contains_key(&5).unwrap());
        assert!(!map.contains_key(&6).unwrap());
        assert!(map.contains_value(&"v2".to_string()).unwrap());
        assert!(!map.contains_value(&"v9".to_string()).unwrap());
    }

    #[test]
    fn replace_ignores_absent_keys() {
        let mut map = filled(4, 0..3);
        assert_eq!(map.replace(&9, "x".into()).unwrap(), None);
        assert!(!map.replace_if(&1, &"nope".into(), "x".into()).unwrap());
        assert!(!map.contains_key(&9).unwrap());
        assert_eq!(map.get(&1).unwrap().map(String::as_str), Some("v1"));
    }

    #[test]
    fn position_of_walks_segments() {
        let map = filled(4, 0..5);
        let pos = map.position_of(3).unwrap();
        assert_eq!(
            pos,
            IndexPosition {
                segment_index: 1,
                local_index: 1,
                segment_start: 2,
                segment_len: 3
            }
        );
        assert!(matches!(
            map.position_of(5),
            Err(CoreError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn put_all_counts_new_keys() {
        let mut map = map(4);
        let added = map
            .put_all([(1, "a".to_string()), (2, "b".to_string()), (1, "c".to_string())])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn checkpoint_and_open() {
        let store = MemoryPayloads::new();
        let mut map: IdMap = LazyMap::with_hasher(
            Config::for_map().max_segment_size(4),
            store.clone(),
            IdentityState::default(),
        )
        .unwrap();
        for key in 0..10 {
            map.put(key, format!("v{key}")).unwrap();
        }
        let manifest = map.checkpoint().unwrap();

        let mut reopened: IdMap = LazyMap::open(
            &manifest,
            store,
            Box::new(RecencyPolicy::new(1).unwrap()),
            IdentityState::default(),
        )
        .unwrap();
        assert!(reopened.segments().iter().all(|info| !info.loaded));
        assert_eq!(reopened.get(&7).unwrap().map(String::as_str), Some("v7"));
        assert_eq!(reopened.stats().loads(), 1);
        reopened.verify().unwrap();
    }

    #[test]
    fn open_rejects_other_hasher() {
        let store = MemoryPayloads::new();
        let mut map: LazyMap<String, usize> =
            LazyMap::with_store(Config::for_map().max_segment_size(8), store.clone()).unwrap();
        for n in 0..50 {
            map.put(format!("key-{n}"), n).unwrap();
        }
        let manifest = map.checkpoint().unwrap();

        let keyed = std::collections::hash_map::RandomState::new();
        let reopened: CoreResult<LazyMap<String, usize, _, _>> =
            LazyMap::open(&manifest, store.clone(), Box::new(NeverPolicy), keyed);
        assert!(matches!(
            reopened,
            Err(CoreError::InvalidConfiguration { .. })
        ));

        let mut same: LazyMap<String, usize> =
            LazyMap::open(&manifest, store, Box::new(NeverPolicy), FixedState).unwrap();
        for n in 0..50 {
            assert_eq!(same.get(format!("key-{n}").as_str()).unwrap(), Some(&n));
        }
    }

    #[test]
    fn eviction_keeps_bounded_residency() {
        let mut map: LazyMap<i32, i32, _, IdentityState> = LazyMap::with_hasher(
            Config::for_map()
                .max_segment_size(2)
                .eviction(EvictionConfig::Recency { resident: 2 }),
            MemoryPayloads::new(),
            IdentityState::default(),
        )
        .unwrap();
        for key in 0..20 {
            map.put(key, key).unwrap();
        }
        map.flush().unwrap();

        for key in 0..20 {
            assert_eq!(map.get(&key).unwrap(), Some(&key));
        }
        let loaded = map.segments().iter().filter(|info| info.loaded).count();
        assert!(loaded <= 3, "loaded {loaded}");
        assert!(map.stats().evictions() > 0);
    }

    #[test]
    fn clear_and_reuse() {
        let mut map = filled(4, 0..10);
        let segments = map.segment_count() as u64;
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.stats().segments_dropped(), segments);
        map.put(1, "one".into()).unwrap();
        assert_partition(&map);
    }

    #[test]
    fn try_clone_is_independent() {
        let mut map = filled(4, 0..6);
        let mut copy = map.try_clone().unwrap();
        copy.put(0, "changed".into()).unwrap();
        copy.remove(&5).unwrap();

        assert_eq!(map.get(&0).unwrap().map(String::as_str), Some("v0"));
        assert_eq!(map.len(), 6);
        assert_eq!(copy.len(), 5);
    }

    #[test]
    fn debug_never_loads() {
        let mut map = filled(4, 0..5);
        map.table.segments[1].flags.dirty = false;
        map.table.segments[1].payload.take();

        assert_eq!(
            format!("{map:?}"),
            r#"[(0, "v0"), (1, "v1"), [3 unloaded]]"#
        );
    }

    #[test]
    fn verify_detects_gap() {
        let mut map = filled(4, 0..5);
        map.table.segments[1].span.min = 3;
        assert!(matches!(
            map.verify(),
            Err(CoreError::CorruptSegmentIndex { .. })
        ));
    }

    #[derive(Debug, Clone, Copy, Default)]
    struct CollidingState;

    struct Constant;

    impl std::hash::Hasher for Constant {
        fn finish(&self) -> u64 {
            42
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for CollidingState {
        type Hasher = Constant;

        fn build_hasher(&self) -> Constant {
            Constant
        }
    }
}
