//! # lazyseg codec
//!
//! Payload encoding for segments that leave memory.
//!
//! A payload is one version byte followed by the CBOR encoding of the
//! segment's elements. Any `serde` type can be carried; the core crate picks
//! the shape (`Vec<T>` for sequence segments, `Vec<(K, V)>` for map
//! segments).
//!
//! ## Usage
//!
//! ```
//! use lazyseg_codec::{from_cbor, to_cbor};
//!
//! let bytes = to_cbor(&vec![1u32, 2, 3]).unwrap();
//! let decoded: Vec<u32> = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;

pub use decoder::from_cbor;
pub use encoder::to_cbor;
pub use error::{CodecError, CodecResult};

/// Version byte leading every payload.
pub const FORMAT_VERSION: u8 = 1;
