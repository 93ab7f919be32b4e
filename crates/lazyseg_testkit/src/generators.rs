//! Property-based test generators using proptest.
//!
//! Operations carry raw positions; harnesses reduce them modulo the
//! current length so every generated sequence is applicable.

use lazyseg_core::EvictionConfig;
use proptest::prelude::*;

/// One mutation or read of a sequence.
#[derive(Debug, Clone)]
pub enum ListOp {
    /// Append a value
    Push(i32),
    /// Append several values
    Extend(Vec<i32>),
    /// Insert a value at a position
    Insert(usize, i32),
    /// Insert several values at a position
    InsertAll(usize, Vec<i32>),
    /// Overwrite a position
    Set(usize, i32),
    /// Remove a position
    RemoveAt(usize),
    /// Remove the first occurrence of a value
    RemoveValue(i32),
    /// Remove every value divisible by the modulus
    RemoveMultiples(i32),
    /// Read a position
    Get(usize),
    /// Repack segments
    Consolidate,
    /// Persist dirty segments
    Flush,
}

/// One mutation or read of a map.
#[derive(Debug, Clone)]
pub enum MapOp {
    /// Insert or overwrite a key
    Put(i32, i32),
    /// Remove a key
    Remove(i32),
    /// Overwrite an existing key only
    Replace(i32, i32),
    /// Read a key
    Get(i32),
    /// Persist dirty segments
    Flush,
}

fn small_value() -> impl Strategy<Value = i32> {
    -50..50i32
}

/// Strategy for generating sequence operations.
pub fn list_op_strategy() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => small_value().prop_map(ListOp::Push),
        1 => prop::collection::vec(small_value(), 0..12).prop_map(ListOp::Extend),
        3 => (any::<usize>(), small_value()).prop_map(|(at, v)| ListOp::Insert(at, v)),
        1 => (any::<usize>(), prop::collection::vec(small_value(), 0..12))
            .prop_map(|(at, values)| ListOp::InsertAll(at, values)),
        2 => (any::<usize>(), small_value()).prop_map(|(at, v)| ListOp::Set(at, v)),
        3 => any::<usize>().prop_map(ListOp::RemoveAt),
        1 => small_value().prop_map(ListOp::RemoveValue),
        1 => (2..7i32).prop_map(ListOp::RemoveMultiples),
        2 => any::<usize>().prop_map(ListOp::Get),
        1 => Just(ListOp::Consolidate),
        1 => Just(ListOp::Flush),
    ]
}

/// Strategy for generating map operations over a small key space, so that
/// removals and overwrites hit existing keys.
pub fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    let key = 0..64i32;
    prop_oneof![
        5 => (key.clone(), any::<i32>()).prop_map(|(k, v)| MapOp::Put(k, v)),
        3 => key.clone().prop_map(MapOp::Remove),
        1 => (key.clone(), any::<i32>()).prop_map(|(k, v)| MapOp::Replace(k, v)),
        2 => key.prop_map(MapOp::Get),
        1 => Just(MapOp::Flush),
    ]
}

/// Strategy for generating a sequence of list operations.
pub fn list_ops(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<ListOp>> {
    prop::collection::vec(list_op_strategy(), min_ops..max_ops)
}

/// Strategy for generating a sequence of map operations.
pub fn map_ops(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<MapOp>> {
    prop::collection::vec(map_op_strategy(), min_ops..max_ops)
}

/// Strategy for deterministic eviction configurations.
pub fn eviction_strategy() -> impl Strategy<Value = EvictionConfig> {
    prop_oneof![
        Just(EvictionConfig::Never),
        (1..4usize).prop_map(|resident| EvictionConfig::Recency { resident }),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
