//! Canonical JSON encoding.
//!
//! The canonical form is the hash pre-image for action arguments and signed
//! approval artifacts. Two structurally equal values always encode to the
//! same bytes:
//!
//! - object keys are emitted in lexicographic (byte) order, at every depth
//! - no whitespace is emitted between tokens
//! - strings keep non-ASCII characters as raw UTF-8; only the escapes JSON
//!   requires are applied
//! - numbers use `serde_json`'s shortest round-trip formatting

use serde::Serialize;
use serde_json::Value;

use crate::error::{CryptoError, CryptoResult};

/// Encode a JSON value in canonical form.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use warrant_crypto::canonical_encode;
///
/// let bytes = canonical_encode(&json!({"b": [1, {"d": 2, "c": 3}], "a": null}));
/// assert_eq!(bytes, br#"{"a":null,"b":[1,{"c":3,"d":2}]}"#);
/// ```
#[must_use]
pub fn canonical_encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_value(&mut out, value);
    out
}

/// Serialize any value through `serde_json` and encode the result canonically.
///
/// # Errors
///
/// Returns [`CryptoError::Encoding`] if the value cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn canonical_encode_serialize<T: Serialize + ?Sized>(value: &T) -> CryptoResult<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    Ok(canonical_encode(&value))
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        },
        Value::Object(map) => {
            // `serde_json::Map` only iterates sorted when `preserve_order` is
            // off, and feature unification can turn it on.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, item);
            }
            out.push(b'}');
        },
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    // Serializing a `&str` cannot fail; fall back to an empty literal anyway.
    match serde_json::to_vec(s) {
        Ok(bytes) => out.extend_from_slice(&bytes),
        Err(_) => out.extend_from_slice(b"\"\""),
    }
}
