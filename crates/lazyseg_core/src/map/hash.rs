//! Key hashing for map segments.

use std::hash::{BuildHasher, Hash};
use xxhash_rust::xxh3::Xxh3;

/// Hasher builder with a specified, seedless algorithm (XXH3-64).
///
/// Every process and toolchain computes the same hashes, so the segment
/// ranges recorded in a manifest still match the keys after reopen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedState;

impl BuildHasher for FixedState {
    type Hasher = Xxh3;

    fn build_hasher(&self) -> Xxh3 {
        Xxh3::new()
    }
}

/// Sample keys hashed into a manifest fingerprint.
const FINGERPRINT_SAMPLES: [&str; 4] = ["", "lazyseg", "segment-range", "0123456789abcdef"];

/// Summarizes how `hasher` hashes a fixed set of keys.
///
/// Two builders with the same fingerprint place the sample keys in the
/// same hash ranges; a differing fingerprint means a manifest written with
/// one cannot be read with the other.
pub(crate) fn fingerprint<H: BuildHasher>(hasher: &H) -> u64 {
    FINGERPRINT_SAMPLES
        .iter()
        .map(|sample| hasher.hash_one(sample))
        .chain([hasher.hash_one(0x5eed_u64)])
        .fold(0, |acc, hash| acc.rotate_left(17) ^ hash)
}

/// Hashes `key` into the 32-bit map hash domain.
///
/// The 64-bit hash is folded by xoring its halves, then the upper 16 bits
/// are mixed into the lower ones.
pub(crate) fn spread<H, Q>(hasher: &H, key: &Q) -> i32
where
    H: BuildHasher,
    Q: Hash + ?Sized,
{
    let wide = hasher.hash_one(key);
    let folded = (wide ^ (wide >> 32)) as u32;
    (folded ^ (folded >> 16)) as i32
}
