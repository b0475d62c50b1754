//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warrant_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Encoding and hashing
pub use crate::{ContentHash, action_hash, canonical_encode, canonical_encode_serialize};

// Keys and signatures
pub use crate::{KeyPair, PublicKey, Signature, SignedEvent};
