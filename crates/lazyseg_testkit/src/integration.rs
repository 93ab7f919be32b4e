//! Model-based test harnesses.
//!
//! Each harness drives a container and a plain std collection through the
//! same operations and asserts they agree.

use crate::generators::{ListOp, MapOp};
use lazyseg_core::{
    Config, CoreError, LazyList, LazyMap, MapEntry, MemoryPayloads, PayloadStore,
};
use std::collections::HashMap;

/// Drives a [`LazyList`] and a `Vec` in lockstep.
pub struct ListHarness<S = MemoryPayloads<Vec<i32>>> {
    /// The container under test.
    pub list: LazyList<i32, S>,
    /// The reference model.
    pub model: Vec<i32>,
}

impl ListHarness {
    /// Creates a harness over an in-memory list.
    pub fn new(config: Config) -> Self {
        Self::with_store(config, MemoryPayloads::new())
    }
}

impl<S: PayloadStore<Vec<i32>>> ListHarness<S> {
    /// Creates a harness over a list backed by `store`.
    pub fn with_store(config: Config, store: S) -> Self {
        Self {
            list: LazyList::with_store(config, store).expect("Failed to create list"),
            model: Vec::new(),
        }
    }

    /// Applies one operation to both sides and compares any result.
    pub fn apply(&mut self, op: &ListOp) {
        let len = self.model.len();
        match op {
            ListOp::Push(value) => {
                self.list.push(*value).expect("push failed");
                self.model.push(*value);
            }
            ListOp::Extend(values) => {
                let added = self.list.extend(values.iter().copied()).expect("extend failed");
                assert_eq!(added, values.len());
                self.model.extend_from_slice(values);
            }
            ListOp::Insert(at, value) => {
                let at = at % (len + 1);
                self.list.insert(at, *value).expect("insert failed");
                self.model.insert(at, *value);
            }
            ListOp::InsertAll(at, values) => {
                let at = at % (len + 1);
                let added = self
                    .list
                    .insert_all(at, values.iter().copied())
                    .expect("insert_all failed");
                assert_eq!(added, values.len());
                let tail = self.model.split_off(at);
                self.model.extend_from_slice(values);
                self.model.extend(tail);
            }
            ListOp::Set(at, value) => {
                if len == 0 {
                    let err = self.list.set(*at, *value).unwrap_err();
                    assert!(matches!(err, CoreError::IndexOutOfRange { .. }));
                    return;
                }
                let at = at % len;
                let old = self.list.set(at, *value).expect("set failed");
                assert_eq!(old, std::mem::replace(&mut self.model[at], *value));
            }
            ListOp::RemoveAt(at) => {
                if len == 0 {
                    let err = self.list.remove_at(*at).unwrap_err();
                    assert!(matches!(err, CoreError::IndexOutOfRange { .. }));
                    return;
                }
                let at = at % len;
                let removed = self.list.remove_at(at).expect("remove_at failed");
                assert_eq!(removed, self.model.remove(at));
            }
            ListOp::RemoveValue(value) => {
                let found = self.list.remove_value(value).expect("remove_value failed");
                match self.model.iter().position(|item| item == value) {
                    Some(at) => {
                        assert!(found, "value {value} should have been removed");
                        self.model.remove(at);
                    }
                    None => assert!(!found, "value {value} is not present"),
                }
            }
            ListOp::RemoveMultiples(modulus) => {
                let removed = self
                    .list
                    .remove_if(|item| item % modulus == 0)
                    .expect("remove_if failed");
                self.model.retain(|item| item % modulus != 0);
                assert_eq!(removed, len - self.model.len());
            }
            ListOp::Get(at) => {
                if len == 0 {
                    assert!(self.list.get(*at).is_err());
                    return;
                }
                let at = at % len;
                assert_eq!(*self.list.get(at).expect("get failed"), self.model[at]);
            }
            ListOp::Consolidate => {
                self.list.consolidate().expect("consolidate failed");
            }
            ListOp::Flush => {
                self.list.flush().expect("flush failed");
                assert!(self.list.segments().iter().all(|segment| !segment.dirty));
            }
        }
    }

    /// Asserts that the list matches the model and its index is sound.
    pub fn check(&mut self) {
        assert_eq!(self.list.len(), self.model.len(), "length mismatch");
        self.list.verify().expect("segment index is corrupt");
        let contents = self.list.to_vec().expect("Failed to read list");
        assert_eq!(contents, self.model, "content mismatch");
    }
}

impl Default for ListHarness {
    fn default() -> Self {
        Self::new(Config::for_list())
    }
}

/// Drives a [`LazyMap`] and a `HashMap` in lockstep.
pub struct MapHarness<S = MemoryPayloads<Vec<MapEntry<i32, i32>>>> {
    /// The container under test.
    pub map: LazyMap<i32, i32, S>,
    /// The reference model.
    pub model: HashMap<i32, i32>,
}

impl MapHarness {
    /// Creates a harness over an in-memory map.
    pub fn new(config: Config) -> Self {
        Self::with_store(config, MemoryPayloads::new())
    }
}

impl<S: PayloadStore<Vec<MapEntry<i32, i32>>>> MapHarness<S> {
    /// Creates a harness over a map backed by `store`.
    pub fn with_store(config: Config, store: S) -> Self {
        Self {
            map: LazyMap::with_store(config, store).expect("Failed to create map"),
            model: HashMap::new(),
        }
    }

    /// Applies one operation to both sides and compares any result.
    pub fn apply(&mut self, op: &MapOp) {
        match op {
            MapOp::Put(key, value) => {
                let old = self.map.put(*key, *value).expect("put failed");
                assert_eq!(old, self.model.insert(*key, *value));
            }
            MapOp::Remove(key) => {
                let old = self.map.remove(key).expect("remove failed");
                assert_eq!(old, self.model.remove(key));
            }
            MapOp::Replace(key, value) => {
                let old = self.map.replace(key, *value).expect("replace failed");
                let expected = self
                    .model
                    .get_mut(key)
                    .map(|slot| std::mem::replace(slot, *value));
                assert_eq!(old, expected);
            }
            MapOp::Get(key) => {
                let found = self.map.get(key).expect("get failed").copied();
                assert_eq!(found, self.model.get(key).copied());
            }
            MapOp::Flush => {
                self.map.flush().expect("flush failed");
                assert!(self.map.segments().iter().all(|segment| !segment.dirty));
            }
        }
    }

    /// Asserts that the map matches the model and its index is sound.
    pub fn check(&mut self) {
        assert_eq!(self.map.len(), self.model.len(), "length mismatch");
        self.map.verify().expect("segment index is corrupt");
        let contents: HashMap<i32, i32> = self
            .map
            .iter()
            .collect::<Result<_, _>>()
            .expect("Failed to read map");
        assert_eq!(contents, self.model, "content mismatch");
    }
}

impl Default for MapHarness {
    fn default() -> Self {
        Self::new(Config::for_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{paging_config, small_config};

    #[test]
    fn list_harness_tracks_edits() {
        let mut harness = ListHarness::new(small_config(3));
        for op in [
            ListOp::Extend(vec![1, 2, 3, 4, 5, 6, 7]),
            ListOp::Insert(2, 40),
            ListOp::RemoveAt(0),
            ListOp::Set(100, 9),
            ListOp::RemoveMultiples(2),
            ListOp::Consolidate,
        ] {
            harness.apply(&op);
            harness.check();
        }
        assert_eq!(harness.model, vec![9, 5, 7]);
    }

    #[test]
    fn list_harness_under_paging() {
        let mut harness = ListHarness::new(paging_config(2, 1));
        harness.apply(&ListOp::Extend((0..10).collect()));
        harness.apply(&ListOp::Flush);
        harness.apply(&ListOp::Get(7));
        harness.apply(&ListOp::RemoveValue(4));
        harness.check();
        assert!(harness.list.stats().evictions() > 0);
    }

    #[test]
    fn empty_list_rejects_positions() {
        let mut harness = ListHarness::default();
        harness.apply(&ListOp::Set(0, 1));
        harness.apply(&ListOp::RemoveAt(0));
        harness.apply(&ListOp::Get(0));
        harness.check();
    }

    #[test]
    fn map_harness_tracks_edits() {
        let mut harness = MapHarness::new(Config::for_map().max_segment_size(4));
        for key in 0..20 {
            harness.apply(&MapOp::Put(key, key * 10));
        }
        harness.apply(&MapOp::Replace(3, -3));
        harness.apply(&MapOp::Replace(99, 1));
        for key in 0..10 {
            harness.apply(&MapOp::Remove(key));
        }
        harness.apply(&MapOp::Get(15));
        harness.check();
        assert_eq!(harness.model.len(), 10);
    }
}
