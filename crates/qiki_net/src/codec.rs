//! JSON codec helpers.
//!
//! Thin wrappers around `serde_json` for encoding and decoding bus
//! payloads. All wire payloads are UTF-8 JSON; schemas tolerate unknown
//! keys, so decoding is forward-compatible by construction.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    serde_json::to_vec(value).map_err(NetError::Encode)
}

/// Decode a value from JSON bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    serde_json::from_slice(bytes).map_err(NetError::Decode)
}
