//! Shared helpers for the lazyseg benchmarks.

pub mod utils;
