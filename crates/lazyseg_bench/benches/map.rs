//! Map benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lazyseg_bench::utils::{map_config, policies, shuffled_keys};
use lazyseg_core::{EvictionConfig, LazyMap};

const LEN: usize = 10_000;
const SEGMENT: usize = 256;

/// Builds a flushed map of `k -> k` for `0..LEN`.
fn filled(eviction: EvictionConfig) -> LazyMap<u64, u64> {
    let mut map = LazyMap::with_config(map_config(SEGMENT, eviction)).unwrap();
    map.put_all((0..LEN as u64).map(|k| (k, k))).unwrap();
    map.flush().unwrap();
    map
}

/// Benchmark inserting keys in random order, which splits segments.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_put");
    let keys = shuffled_keys(LEN);
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let mut map = LazyMap::with_config(map_config(SEGMENT, eviction)).unwrap();
                for &key in &keys {
                    map.put(black_box(key), key).unwrap();
                }
                black_box(map.segment_count());
            });
        });
    }

    group.finish();
}

/// Benchmark lookups of present keys in random order.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_get");
    let keys = shuffled_keys(LEN);
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        let mut map = filled(eviction);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(map.get(black_box(key)).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark removing every key, which merges emptied segments.
fn bench_remove_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_remove_all");
    let keys = shuffled_keys(LEN);
    group.throughput(Throughput::Elements(LEN as u64));
    group.sample_size(20);

    group.bench_function("never", |b| {
        b.iter(|| {
            let mut map = filled(EvictionConfig::Never);
            for key in &keys {
                map.remove(key).unwrap();
            }
            black_box(map.segment_count());
        });
    });

    group.finish();
}

/// Benchmark a full iteration in hash order.
fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_iterate");
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        let mut map = filled(eviction);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let sum = map
                    .values()
                    .map(|value| value.unwrap())
                    .fold(0u64, u64::wrapping_add);
                black_box(sum);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_get, bench_remove_all, bench_iterate);

criterion_main!(benches);
