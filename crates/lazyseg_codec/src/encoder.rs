//! Payload encoder.

use crate::error::{CodecError, CodecResult};
use crate::FORMAT_VERSION;
use serde::Serialize;

/// Encode a value as a versioned CBOR payload.
///
/// The first byte is [`FORMAT_VERSION`], the rest is the CBOR encoding of
/// `value`.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = vec![FORMAT_VERSION];
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}
