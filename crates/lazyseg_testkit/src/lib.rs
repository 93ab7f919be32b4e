//! # lazyseg Testkit
//!
//! Test utilities for lazyseg.
//!
//! This crate provides:
//! - Instrumented payload stores that record or fail on demand
//! - An identity hasher for predictable map segment boundaries
//! - Property-based operation generators using proptest
//! - Model harnesses checking containers against `Vec` and `HashMap`
//!
//! ## Usage
//!
//! ```rust
//! use lazyseg_testkit::prelude::*;
//!
//! let mut harness = ListHarness::new(small_config(3));
//! harness.apply(&ListOp::Push(7));
//! harness.apply(&ListOp::Insert(0, 1));
//! harness.check();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
