//! Ed25519 signatures over approval artifact identifiers.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, CryptoResult};

/// An Ed25519 signature (64 bytes). Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Try to create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignatureLength`] if the slice is not exactly 64 bytes.
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        <[u8; 64]>::try_from(slice)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSignatureLength {
                expected: 64,
                actual: slice.len(),
            })
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Encode as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 64 bytes.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        Self::try_from_slice(&bytes)
    }

    /// Verify this signature against a message and public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key is invalid or verification fails.
    pub fn verify(&self, message: &[u8], public_key: &[u8; 32]) -> CryptoResult<()> {
        let verifying_key = VerifyingKey::from_bytes(public_key)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

        verifying_key
            .verify(message, &DalekSignature::from_bytes(&self.0))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl From<DalekSignature> for Signature {
    fn from(sig: DalekSignature) -> Self {
        Self(sig.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_signature_verification() {
        let keypair = KeyPair::generate();
        let sig = keypair.sign(b"approval id");

        assert!(sig.verify(b"approval id", keypair.public_key_bytes()).is_ok());
        assert!(
            sig.verify(b"another id", keypair.public_key_bytes())
                .is_err()
        );

        let other = KeyPair::generate();
        assert!(matches!(
            sig.verify(b"approval id", other.public_key_bytes()),
            Err(CryptoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_hex_serde() {
        let sig = KeyPair::generate().sign(b"m");
        let encoded = serde_json::to_string(&sig).unwrap();
        assert_eq!(encoded.len(), 130);
        let decoded: Signature = serde_json::from_str(&encoded).unwrap();
        assert_eq!(sig, decoded);
    }

    #[test]
    fn test_invalid_signature_length() {
        assert!(matches!(
            Signature::try_from_slice(&[0u8; 63]),
            Err(CryptoError::InvalidSignatureLength { .. })
        ));
    }
}
