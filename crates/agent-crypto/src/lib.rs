//! # Agent Crypto - Signing and Hybrid Encryption
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Envelope signatures |
//! | `symmetric` | XChaCha20-Poly1305 | Body and key-wrap AEAD |
//! | `hybrid` | X25519 + HKDF-SHA256 | Per-message content key wrapping |
//! | `keystore` | - | Key-store boundary and agent identity |
//! | `provider` | - | `CryptoProvider` used by the agent pipeline |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency, strict verification
//! - **XChaCha20**: 192-bit nonce, constant-time
//! - **Hybrid**: one asymmetric operation per message, fresh content key each
//!   time, ephemeral sender key each time
//! - Secret keys zeroize on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hybrid;
pub mod keystore;
pub mod provider;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hybrid::{EncryptionKeyPair, WrappedKey};
pub use keystore::{AgentIdentity, AgentKeys, InMemoryKeyStore, KeyStore};
pub use provider::CryptoProvider;
pub use signatures::{validate_signing_key, verify_signature, AgentSigningKey};
pub use symmetric::{ContentKey, Nonce};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
