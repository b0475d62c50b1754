//! Warrant Crypto - integrity primitives for the approval gateway.
//!
//! This crate provides:
//! - Canonical JSON encoding (sorted keys, no incidental whitespace)
//! - SHA-256 content hashing, including the action hash that binds an
//!   approval to the exact arguments it authorizes
//! - Ed25519 key pairs with secure memory handling
//! - [`SignedEvent`], the content-addressed artifact external approvers sign
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warrant_crypto::{action_hash, canonical_encode, KeyPair};
//!
//! let a = json!({"path": "r.md", "content": "hi"});
//! let b = json!({"content": "hi", "path": "r.md"});
//!
//! // Key order never changes the encoding or the hash.
//! assert_eq!(canonical_encode(&a), canonical_encode(&b));
//! assert_eq!(action_hash(&a), action_hash(&b));
//!
//! let keypair = KeyPair::generate();
//! let signature = keypair.sign(b"approve");
//! assert!(keypair.verify(b"approve", &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod canonical;
mod error;
mod event;
mod hash;
mod keypair;
mod signature;

pub use canonical::{canonical_encode, canonical_encode_serialize};
pub use error::{CryptoError, CryptoResult};
pub use event::SignedEvent;
pub use hash::{ContentHash, action_hash};
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
