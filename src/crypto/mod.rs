//! Election key cryptography.
//!
//! Votes are encrypted under the election public key and tallied by adding
//! ciphertexts together, so whatever cryptosystem backs the election keys
//! must be additively homomorphic. The rest of the backend only ever sees
//! keys as opaque strings.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod paillier;

pub use paillier::{Ciphertext, PaillierKeyGenerator, PaillierPrivateKey, PaillierPublicKey};

/// Failures of the election cryptosystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Malformed election key: {0}")]
    MalformedKey(String),
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),
    #[error("Plaintext does not fit in the key modulus")]
    PlaintextTooLarge,
}

/// A freshly generated pair of election keys, in their stored string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Source of election key pairs.
///
/// Implementations must only hand out keys for a cryptosystem supporting
/// homomorphic addition over ciphertexts, and every call must produce a
/// pair that has never been produced before.
#[rocket::async_trait]
pub trait KeyGenerator: Send + Sync {
    async fn generate_key_pair(&self) -> Result<KeyPair>;
}
