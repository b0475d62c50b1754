//! Content hashing using SHA-256.
//!
//! Used for the action hash (tamper detection and approval binding), the
//! content-derived identifier of signed approval artifacts, and audit chain
//! linking.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::canonical_encode;

/// A SHA-256 content hash (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary data.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash the canonical encoding of a JSON value.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        Self::hash(&canonical_encode(value))
    }

    /// Create a zero hash (used as the genesis link of a chain).
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Check if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Try to create from a slice.
    ///
    /// Returns `None` if the slice is not exactly 32 bytes.
    #[must_use]
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(slice).ok().map(Self)
    }

    /// Encode as lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

/// Compute the action hash of a JSON value.
///
/// `SHA-256(canonical_encode(value))` as a lowercase hex digest. This is the
/// value stored with every action and embedded in every approval.
#[must_use]
pub fn action_hash(value: &Value) -> String {
    ContentHash::of_value(value).to_hex()
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            ContentHash::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_action_hash_ignores_key_order() {
        let p1 = json!({"path": "r.md", "content": "hi", "meta": {"a": 1, "b": 2}});
        let p2 = json!({"meta": {"b": 2, "a": 1}, "content": "hi", "path": "r.md"});
        assert_eq!(action_hash(&p1), action_hash(&p2));
    }

    #[test]
    fn test_action_hash_detects_changes() {
        let original = json!({"path": "r.md", "content": "hi"});
        let tampered = json!({"path": "r.md", "content": "hi!"});
        assert_ne!(action_hash(&original), action_hash(&tampered));
    }

    #[test]
    fn test_action_hash_is_lowercase_hex() {
        let digest = action_hash(&json!({"plan": "x"}));
        assert_eq!(digest.len(), 64);
        assert!(
            digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_zero_hash() {
        assert!(ContentHash::zero().is_zero());
        assert!(!ContentHash::hash(b"data").is_zero());
    }

    #[test]
    fn test_hex_decode_rejects_wrong_length() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex("not hex").is_err());
    }

    #[test]
    fn test_serde() {
        let hash = ContentHash::hash(b"test");
        let encoded = serde_json::to_string(&hash).unwrap();
        assert_eq!(encoded, format!("\"{}\"", hash.to_hex()));
        let decoded: ContentHash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(hash, decoded);
    }
}
