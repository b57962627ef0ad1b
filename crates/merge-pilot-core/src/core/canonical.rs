// crates/merge-pilot-core/src/core/canonical.rs
// ============================================================================
// Module: Merge Pilot Canonical Codec
// Description: Byte-stable JSON encoding for plans and result trees.
// Purpose: Guarantee deterministic artifacts across runs and hosts.
// Dependencies: serde, serde_jcs, serde_json
// ============================================================================

//! ## Overview
//! Every artifact Merge Pilot writes is canonical JSON per RFC 8785: map keys
//! in lexicographic byte order, shortest round-tripping number form, minimal
//! string escaping. The encoder appends a single trailing newline so files
//! are byte-stable and diff-friendly.
//!
//! Laws: `decode(encode(x)) == x` for any representable tree, and two
//! structurally equal inputs encode to byte-identical outputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while encoding or decoding canonical JSON.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Value is not representable in canonical JSON (non-finite number,
    /// non-string map key, or a serialization cycle).
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
    /// Input bytes are not valid JSON for the requested type.
    #[error("failed to decode json: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a value as canonical JSON bytes terminated by one newline.
///
/// # Errors
///
/// Returns [`EncodingError::Canonicalization`] when the value is not
/// representable.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| EncodingError::Canonicalization(err.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Encodes a value as a canonical JSON string terminated by one newline.
///
/// # Errors
///
/// Returns [`EncodingError::Canonicalization`] when the value is not
/// representable.
pub fn encode_string<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodingError> {
    let bytes = encode(value)?;
    String::from_utf8(bytes).map_err(|err| EncodingError::Canonicalization(err.to_string()))
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes canonical (or plain) JSON bytes into a typed value.
///
/// # Errors
///
/// Returns [`EncodingError::Decode`] when the bytes are not valid JSON for
/// the target type.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EncodingError> {
    serde_json::from_slice(bytes).map_err(|err| EncodingError::Decode(err.to_string()))
}

/// Decodes JSON bytes into an untyped value tree.
///
/// # Errors
///
/// Returns [`EncodingError::Decode`] when the bytes are not valid JSON.
pub fn decode_value(bytes: &[u8]) -> Result<serde_json::Value, EncodingError> {
    serde_json::from_slice(bytes).map_err(|err| EncodingError::Decode(err.to_string()))
}
