//! Benchmark utilities.

use lazyseg_core::{Config, EvictionConfig};
use rand::seq::SliceRandom;
use rand::Rng;

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random positions below `len`.
pub fn random_indices(count: usize, len: usize) -> Vec<usize> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..len)).collect()
}

/// Generate the keys `0..count` in random order.
pub fn shuffled_keys(count: usize) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..count as u64).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

/// The eviction policies every container benchmark runs under.
pub fn policies() -> [(&'static str, EvictionConfig); 3] {
    [
        ("never", EvictionConfig::Never),
        ("recency-2", EvictionConfig::Recency { resident: 2 }),
        ("recency-8", EvictionConfig::Recency { resident: 8 }),
    ]
}

/// Sequence configuration with the given segment size and policy.
pub fn list_config(segment_size: usize, eviction: EvictionConfig) -> Config {
    Config::for_list()
        .max_segment_size(segment_size)
        .eviction(eviction)
}

/// Map configuration with the given split target and policy.
pub fn map_config(segment_size: usize, eviction: EvictionConfig) -> Config {
    Config::for_map()
        .max_segment_size(segment_size)
        .eviction(eviction)
}
