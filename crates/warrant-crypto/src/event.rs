//! Signed events: the external approval artifact format.
//!
//! An event's identifier is derived from its content,
//! `hex(SHA-256(canonical_encode([0, signer, created_at, kind, tags, content])))`,
//! and the signer's Ed25519 signature covers the 32 raw identifier bytes.
//! Any edit to a signed field therefore changes the identifier and
//! invalidates the signature.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::ContentHash;
use crate::keypair::{KeyPair, PublicKey};
use crate::signature::Signature;

/// A content-addressed, signed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    /// Content-derived identifier (lowercase hex).
    pub id: String,
    /// Public key of the signer.
    pub signer: PublicKey,
    /// Unix timestamp (seconds) chosen by the signer.
    pub created_at: i64,
    /// Event kind.
    pub kind: u32,
    /// Ordered tag lists.
    pub tags: Vec<Vec<String>>,
    /// Free-form content.
    pub content: String,
    /// Signature over the raw identifier bytes.
    pub signature: Signature,
}

impl SignedEvent {
    /// Compute the identifier for the given fields.
    #[must_use]
    pub fn compute_id(
        signer: &PublicKey,
        created_at: i64,
        kind: u32,
        tags: &[Vec<String>],
        content: &str,
    ) -> ContentHash {
        ContentHash::of_value(&json!([0, signer.to_hex(), created_at, kind, tags, content]))
    }

    /// Build and sign an event.
    #[must_use]
    pub fn sign(
        keypair: &KeyPair,
        created_at: i64,
        kind: u32,
        tags: Vec<Vec<String>>,
        content: impl Into<String>,
    ) -> Self {
        let signer = keypair.export_public_key();
        let content = content.into();
        let id = Self::compute_id(&signer, created_at, kind, &tags, &content);
        Self {
            id: id.to_hex(),
            signer,
            created_at,
            kind,
            tags,
            content,
            signature: keypair.sign(id.as_bytes()),
        }
    }

    /// Check that the identifier matches the fields and the signature is
    /// valid for the claimed signer.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EventIdMismatch`] if the identifier was not
    /// derived from the fields, or [`CryptoError::SignatureVerificationFailed`]
    /// if the signature does not verify.
    pub fn verify(&self) -> CryptoResult<()> {
        let expected = Self::compute_id(
            &self.signer,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if expected.to_hex() != self.id {
            return Err(CryptoError::EventIdMismatch);
        }
        self.signer.verify(expected.as_bytes(), &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(keypair: &KeyPair) -> SignedEvent {
        SignedEvent::sign(
            keypair,
            1_700_000_000,
            1,
            vec![vec!["t".into(), "warrant".into()]],
            "hello relays",
        )
    }

    #[test]
    fn test_signed_event_verifies() {
        let kp = KeyPair::generate();
        assert!(event(&kp).verify().is_ok());
    }

    #[test]
    fn test_edited_field_breaks_id() {
        let kp = KeyPair::generate();
        let mut ev = event(&kp);
        ev.content = "edited".into();
        assert!(matches!(ev.verify(), Err(CryptoError::EventIdMismatch)));
    }

    #[test]
    fn test_recomputed_id_with_foreign_signature_fails() {
        let kp = KeyPair::generate();
        let mut ev = event(&kp);
        ev.content = "edited".into();
        ev.id = SignedEvent::compute_id(&ev.signer, ev.created_at, ev.kind, &ev.tags, &ev.content)
            .to_hex();
        assert!(matches!(
            ev.verify(),
            Err(CryptoError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn test_swapped_signer_fails() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let mut ev = event(&kp);
        ev.signer = other.export_public_key();
        assert!(ev.verify().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let kp = KeyPair::generate();
        let ev = event(&kp);
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["signer"], kp.export_public_key().to_hex());
        assert_eq!(value["kind"], 1);
        let back: SignedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, ev);
    }
}
