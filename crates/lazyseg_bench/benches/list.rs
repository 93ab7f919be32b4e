//! Sequence benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lazyseg_bench::utils::{list_config, policies, random_indices};
use lazyseg_core::{EvictionConfig, LazyList};

const LEN: usize = 10_000;
const SEGMENT: usize = 256;

/// Builds a flushed list of `0..LEN`.
fn filled(eviction: EvictionConfig) -> LazyList<u64> {
    let mut list = LazyList::with_config(list_config(SEGMENT, eviction)).unwrap();
    list.extend(0..LEN as u64).unwrap();
    list.flush().unwrap();
    list
}

/// Benchmark appending to an empty list.
fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_push");
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let mut list = LazyList::with_config(list_config(SEGMENT, eviction)).unwrap();
                for value in 0..LEN as u64 {
                    list.push(black_box(value)).unwrap();
                }
                black_box(list.len());
            });
        });
    }

    group.finish();
}

/// Benchmark sequential reads, which page each segment in once.
fn bench_sequential_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_sequential_get");
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        let mut list = filled(eviction);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for index in 0..LEN {
                    sum = sum.wrapping_add(*list.get(index).unwrap());
                }
                black_box(sum);
            });
        });
    }

    group.finish();
}

/// Benchmark random reads, which page segments in and out.
fn bench_random_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_random_get");
    let indices = random_indices(1_000, LEN);
    group.throughput(Throughput::Elements(indices.len() as u64));

    for (name, eviction) in policies() {
        let mut list = filled(eviction);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                for &index in &indices {
                    black_box(list.get(black_box(index)).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark inserts into the middle, which split full segments.
fn bench_insert_middle(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_insert_middle");

    for count in [100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut list = filled(EvictionConfig::Never);
                for value in 0..count as u64 {
                    let at = list.len() / 2;
                    list.insert(at, value).unwrap();
                }
                black_box(list.segment_count());
            });
        });
    }

    group.finish();
}

/// Benchmark thinning a list and repacking its segments.
fn bench_remove_if_consolidate(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_remove_if_consolidate");
    group.throughput(Throughput::Elements(LEN as u64));

    for (name, eviction) in policies() {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let mut list = filled(eviction);
                let removed = list.remove_if(|v| v % 3 == 0).unwrap();
                list.consolidate().unwrap();
                black_box(removed);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_push,
    bench_sequential_get,
    bench_random_get,
    bench_insert_middle,
    bench_remove_if_consolidate,
);

criterion_main!(benches);
