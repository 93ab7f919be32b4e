//! Model-based property tests.

use lazyseg_core::{Config, EvictionConfig, LazyList, LazyMap};
use lazyseg_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn list_matches_vec(
        max in 1..6usize,
        eviction in eviction_strategy(),
        ops in list_ops(1, 60),
    ) {
        let config = Config::for_list().max_segment_size(max).eviction(eviction);
        let mut harness = ListHarness::new(config);
        for op in &ops {
            harness.apply(op);
        }
        harness.check();
    }

    #[test]
    fn map_matches_hash_map(
        max in 0..6usize,
        eviction in eviction_strategy(),
        ops in map_ops(1, 120),
    ) {
        let config = Config::for_map().max_segment_size(max).eviction(eviction);
        let mut harness = MapHarness::new(config);
        for op in &ops {
            harness.apply(op);
        }
        harness.check();
    }

    #[test]
    fn list_over_recording_store_matches_vec(ops in list_ops(1, 40)) {
        let store = RecordingStore::new();
        let mut harness = ListHarness::with_store(paging_config(3, 1), store.clone());
        for op in &ops {
            harness.apply(op);
        }
        harness.check();
        prop_assert_eq!(store.fetches() as u64, harness.list.stats().loads());
    }

    #[test]
    fn consolidate_packs_segments(values in prop::collection::vec(any::<i16>(), 0..80), max in 1..8usize) {
        let mut list = LazyList::with_config(small_config(max)).unwrap();
        for (i, value) in values.iter().enumerate() {
            list.insert(i / 2, *value).unwrap();
        }
        let before = list.to_vec().unwrap();

        list.consolidate().unwrap();
        prop_assert_eq!(list.to_vec().unwrap(), before);
        prop_assert_eq!(list.segment_count(), values.len().div_ceil(max));
        list.verify().unwrap();
    }

    #[test]
    fn loaded_first_cursor_visits_everything(
        len in 0..40usize,
        touched in prop::collection::vec(any::<usize>(), 0..5),
    ) {
        let config = Config::for_list()
            .max_segment_size(4)
            .eviction(EvictionConfig::Recency { resident: 2 });
        let mut list = LazyList::with_config(config).unwrap();
        list.extend(0..len as i32).unwrap();
        list.flush().unwrap();
        for index in touched {
            if len > 0 {
                list.get(index % len).unwrap();
            }
        }

        let mut cursor = list.loaded_first();
        let mut seen = Vec::new();
        while let Some(item) = cursor.next(&mut list) {
            seen.push(item.unwrap());
        }
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..len as i32).collect::<Vec<_>>());
    }

    #[test]
    fn map_cursor_removes_selected(keys in prop::collection::hash_set(0..500i32, 0..80)) {
        let mut map = LazyMap::with_config(Config::for_map().max_segment_size(4)).unwrap();
        map.put_all(keys.iter().map(|k| (*k, ()))).unwrap();

        let mut cursor = map.key_cursor();
        while let Some(key) = cursor.next(&mut map) {
            if key.unwrap() % 3 == 0 {
                cursor.remove(&mut map).unwrap();
            }
        }

        let expected = keys.iter().filter(|k| *k % 3 != 0).count();
        prop_assert_eq!(map.len(), expected);
        map.verify().unwrap();
        for key in &keys {
            prop_assert_eq!(map.contains_key(key).unwrap(), key % 3 != 0);
        }
    }
}
