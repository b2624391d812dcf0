//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
///
/// None of these are retried automatically: they indicate corruption or an
/// untrusted sender, and the message in question MUST be discarded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// No usable key: never provisioned, or revoked.
    #[error("No key available for {0}")]
    NoKey(String),

    /// Signature missing, malformed, or not produced by the expected key.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Ciphertext or wrapped key failed authentication. Carries no detail
    /// about which step failed.
    #[error("Decryption failed")]
    DecryptFailed,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },
}
