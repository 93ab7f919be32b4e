//! Payload decoder.

use crate::error::{CodecError, CodecResult};
use crate::FORMAT_VERSION;
use serde::de::DeserializeOwned;

/// Decode a value from a versioned CBOR payload.
///
/// # Errors
///
/// Returns an error if the payload is empty, carries an unknown format
/// version, is not valid CBOR for `T`, or has bytes left over.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let Some((&version, body)) = bytes.split_first() else {
        return Err(CodecError::decoding_failed("empty payload"));
    };
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version });
    }

    let mut reader = body;
    let value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: reader.len(),
        });
    }
    Ok(value)
}
