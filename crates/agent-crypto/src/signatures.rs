//! # Ed25519 Signatures
//!
//! Envelope signing and verification.
//!
//! ## Security Properties
//!
//! - No RNG dependency (deterministic nonce from message)
//! - Signing reads only the key it is given; no global state
//! - Verification rejects non-canonical encodings (`verify_strict`)

use crate::CryptoError;
use agent_types::{Signature, SigningPublicKey};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// Ed25519 signing key of an agent. Zeroized on drop by `ed25519-dalek`.
pub struct AgentSigningKey {
    signing_key: SigningKey,
}

impl AgentSigningKey {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Get public key.
    pub fn public_key(&self) -> SigningPublicKey {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Validate that 32 bytes encode a usable Ed25519 public key.
pub fn validate_signing_key(public_key: &SigningPublicKey) -> Result<(), CryptoError> {
    VerifyingKey::from_bytes(public_key)
        .map(|_| ())
        .map_err(|_| CryptoError::InvalidPublicKey)
}

/// Verify `signature` over `message` with `public_key`.
pub fn verify_signature(
    public_key: &SigningPublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature);

    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}
