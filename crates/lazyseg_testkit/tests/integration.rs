//! Integration tests for containers over real stores.

use lazyseg_core::{
    BackedPayloads, Config, CoreError, EvictionConfig, FixedState, LazyList, LazyMap,
    ListManifest, MapManifest,
};
use lazyseg_storage::{FileStore, SegmentStore};
use lazyseg_testkit::{paging_config, small_config, FailingStore, TempFileStore};
use parking_lot::Mutex;
use std::thread;

type FileList = LazyList<i32, BackedPayloads<FileStore>>;
type FileMap = LazyMap<String, u64, BackedPayloads<FileStore>>;

#[test]
fn list_reopens_from_file_store() {
    let temp = TempFileStore::new();
    let mut list: FileList = LazyList::with_store(paging_config(4, 2), temp.payloads()).unwrap();
    list.extend(0..50).unwrap();
    list.remove_at(10).unwrap();
    list.insert(0, -1).unwrap();
    let expected = list.to_vec().unwrap();

    let bytes = list.checkpoint().unwrap().encode().unwrap();
    assert_eq!(temp.store.len(), list.segment_count());
    drop(list);

    let temp = temp.reopen();
    let manifest = ListManifest::decode(&bytes).unwrap();
    let policy = EvictionConfig::Recency { resident: 2 }.build().unwrap();
    let mut reopened: FileList = LazyList::open(&manifest, temp.payloads(), policy).unwrap();

    assert!(reopened.segments().iter().all(|s| !s.loaded && !s.dirty));
    assert_eq!(reopened.len(), expected.len());
    assert_eq!(reopened.to_vec().unwrap(), expected);
    assert!(reopened.segments().iter().filter(|s| s.loaded).count() <= 2);
    reopened.verify().unwrap();
}

#[test]
fn destroyed_segments_leave_the_store() {
    let temp = TempFileStore::new();
    let mut list: FileList = LazyList::with_store(small_config(5), temp.payloads()).unwrap();
    list.extend(0..20).unwrap();
    list.flush().unwrap();
    assert_eq!(temp.store.len(), 4);

    list.remove_if(|v| *v < 10).unwrap();
    assert_eq!(temp.store.len(), 2);

    list.clear();
    assert!(temp.store.is_empty());
}

#[test]
fn map_reopens_from_file_store() {
    let temp = TempFileStore::new();
    let config = Config::for_map()
        .max_segment_size(8)
        .eviction(EvictionConfig::Recency { resident: 3 });
    let mut map: FileMap = LazyMap::with_store(config, temp.payloads()).unwrap();
    for n in 0..100u64 {
        map.put(format!("key-{n}"), n * n).unwrap();
    }
    map.remove("key-7").unwrap();
    assert!(map.segment_count() > 1);

    let manifest = map.checkpoint().unwrap();
    let json = serde_json::to_string(&manifest).unwrap();
    drop(map);

    let temp = temp.reopen();
    let manifest: MapManifest = serde_json::from_str(&json).unwrap();
    let policy = EvictionConfig::Recency { resident: 3 }.build().unwrap();
    let mut reopened: FileMap =
        LazyMap::open(&manifest, temp.payloads(), policy, FixedState::default()).unwrap();

    assert_eq!(reopened.len(), 99);
    assert_eq!(reopened.get("key-7").unwrap(), None);
    for n in (0..100u64).filter(|n| *n != 7) {
        assert_eq!(reopened.get(format!("key-{n}").as_str()).unwrap(), Some(&(n * n)));
    }
    reopened.verify().unwrap();
}

#[test]
fn manifests_round_trip() {
    let mut list = LazyList::with_config(small_config(3)).unwrap();
    list.extend(0..7).unwrap();
    let manifest = list.checkpoint().unwrap();
    assert_eq!(manifest.len(), 7);
    assert_eq!(ListManifest::decode(&manifest.encode().unwrap()).unwrap(), manifest);

    let json = serde_json::to_vec(&manifest).unwrap();
    let parsed: ListManifest = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed, manifest);

    let mut map = LazyMap::with_config(Config::for_map().max_segment_size(2)).unwrap();
    map.put_all((0..10).map(|n| (n, n))).unwrap();
    let manifest = map.checkpoint().unwrap();
    assert_eq!(manifest.len(), 10);
    assert_eq!(MapManifest::decode(&manifest.encode().unwrap()).unwrap(), manifest);
}

#[test]
fn failed_fetch_leaves_list_usable() {
    let store = FailingStore::new();
    let mut list = LazyList::with_store(paging_config(2, 1), store.clone()).unwrap();
    list.extend(0..6).unwrap();
    list.flush().unwrap();
    for index in 0..6 {
        list.get(index).unwrap();
    }

    let victim = list
        .segments()
        .into_iter()
        .find(|s| !s.loaded)
        .expect("some segment was evicted");
    let generation = list.generation();

    store.fail_fetches(true);
    let err = list.get(victim.offset).unwrap_err();
    assert!(matches!(err, CoreError::PersistenceUnavailable { .. }));
    assert_eq!(list.len(), 6);
    assert_eq!(list.generation(), generation);
    list.verify().unwrap();

    store.fail_fetches(false);
    assert_eq!(*list.get(victim.offset).unwrap(), victim.offset as i32);
    assert_eq!(list.to_vec().unwrap(), (0..6).collect::<Vec<_>>());
}

#[test]
fn failed_persist_keeps_segment_dirty() {
    let store = FailingStore::new();
    let mut list = LazyList::with_store(small_config(4), store.clone()).unwrap();
    list.extend(0..4).unwrap();

    store.fail_persists(true);
    assert!(matches!(
        list.flush(),
        Err(CoreError::PersistenceUnavailable { .. })
    ));
    assert!(list.segments()[0].dirty);

    store.fail_persists(false);
    assert_eq!(list.flush().unwrap(), 1);
    assert!(!list.segments()[0].dirty);
}

#[test]
fn splitters_drain_list_from_threads() {
    let mut list = LazyList::with_config(paging_config(10, 2)).unwrap();
    list.extend(0..100).unwrap();
    list.flush().unwrap();

    let mut parts = vec![list.splitter()];
    let mut i = 0;
    while i < parts.len() {
        match parts[i].try_split(&mut list).unwrap() {
            Some(prefix) => parts.push(prefix),
            None => i += 1,
        }
    }
    assert_eq!(parts.len(), 10);

    let shared = Mutex::new(list);
    let mut seen: Vec<i32> = thread::scope(|scope| {
        let handles: Vec<_> = parts
            .into_iter()
            .map(|mut part| {
                let shared = &shared;
                scope.spawn(move || {
                    let mut out = Vec::new();
                    loop {
                        let mut list = shared.lock();
                        if !part.try_advance(&mut *list, |v| out.push(*v)).unwrap() {
                            break;
                        }
                    }
                    out
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
    assert!(shared.lock().segments().iter().all(|s| !s.pinned));
}

#[test]
fn splitters_drain_map_from_threads() {
    let config = Config::for_map().max_segment_size(16);
    let mut map = LazyMap::with_config(config).unwrap();
    map.put_all((0..200u32).map(|n| (n, n * 2))).unwrap();

    let mut first = map.entry_splitter();
    let second = first.try_split(&mut map).unwrap().expect("map spans segments");

    let shared = Mutex::new(map);
    let mut seen: Vec<(u32, u32)> = thread::scope(|scope| {
        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|mut part| {
                let shared = &shared;
                scope.spawn(move || {
                    let mut out = Vec::new();
                    loop {
                        let mut map = shared.lock();
                        if !part.try_advance(&mut *map, |pair| out.push(pair)).unwrap() {
                            break;
                        }
                    }
                    out
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    seen.sort_unstable();
    assert_eq!(seen, (0..200u32).map(|n| (n, n * 2)).collect::<Vec<_>>());
}

#[test]
fn splitter_fails_after_foreign_change() {
    let mut list = LazyList::with_config(small_config(4)).unwrap();
    list.extend(0..12).unwrap();

    let mut splitter = list.splitter();
    assert!(splitter.try_advance(&mut list, |_| {}).unwrap());
    list.push(12).unwrap();

    let err = splitter.try_advance(&mut list, |_| {}).unwrap_err();
    assert!(matches!(err, CoreError::ConcurrentStructuralChange { .. }));
    splitter.release(&mut list);
    assert!(list.segments().iter().all(|s| !s.pinned));
}
