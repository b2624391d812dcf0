//! # Crypto Provider
//!
//! Signs, verifies, encrypts and decrypts on behalf of one agent.
//!
//! Keys are fetched from the [`KeyStore`] on every call; the provider holds
//! no key material of its own and no mutable state, so it can be cloned
//! into worker tasks freely.

use crate::hybrid::{self, WrappedKey};
use crate::keystore::{AgentKeys, KeyStore};
use crate::signatures::verify_signature;
use crate::symmetric::{ContentKey, Nonce};
use crate::CryptoError;
use agent_types::{
    AgentId, EncryptionPublicKey, PublicKeyBundle, SealedBody, Signature, SigningPublicKey,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cryptographic operations for one agent.
#[derive(Clone)]
pub struct CryptoProvider {
    agent_id: AgentId,
    key_store: Arc<dyn KeyStore>,
}

impl CryptoProvider {
    /// Create a provider for `agent_id` backed by `key_store`.
    pub fn new(agent_id: AgentId, key_store: Arc<dyn KeyStore>) -> Self {
        Self {
            agent_id,
            key_store,
        }
    }

    /// The agent this provider acts for.
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn own_keys(&self) -> Result<Arc<AgentKeys>, CryptoError> {
        self.key_store
            .private_keys(&self.agent_id)
            .ok_or_else(|| CryptoError::NoKey(self.agent_id.to_string()))
    }

    /// Public keys of this agent.
    pub fn public_keys(&self) -> Result<PublicKeyBundle, CryptoError> {
        Ok(self.own_keys()?.public_bundle())
    }

    /// Public keys of a peer, if known to the key store.
    pub fn peer_keys(&self, peer_id: &AgentId) -> Option<PublicKeyBundle> {
        self.key_store.public_keys(peer_id)
    }

    /// Install keys announced by a peer if none are provisioned.
    ///
    /// Returns `true` if the store accepted them.
    pub fn install_peer_keys(&self, peer_id: &AgentId, keys: PublicKeyBundle) -> bool {
        let installed = self.key_store.install_peer_keys(peer_id, keys);
        if installed {
            debug!(peer = %peer_id, "peer keys installed");
        }
        installed
    }

    // =========================================================================
    // SIGNATURES
    // =========================================================================

    /// Sign `bytes` with this agent's private key.
    ///
    /// # Errors
    ///
    /// `CryptoError::NoKey` if the key is absent or revoked.
    pub fn sign(&self, bytes: &[u8]) -> Result<Signature, CryptoError> {
        let keys = self.own_keys()?;
        Ok(keys.signing().sign(bytes))
    }

    /// `true` iff `signature` over `bytes` was produced by `public_key`.
    #[must_use]
    pub fn verify(&self, bytes: &[u8], signature: &Signature, public_key: &SigningPublicKey) -> bool {
        verify_signature(public_key, bytes, signature).is_ok()
    }

    /// Verify a signature from a known peer.
    ///
    /// # Errors
    ///
    /// - `CryptoError::NoKey` if the peer has no public key in the store
    /// - `CryptoError::InvalidSignature` on any verification failure
    pub fn verify_from(
        &self,
        peer_id: &AgentId,
        bytes: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        let keys = self
            .key_store
            .public_keys(peer_id)
            .ok_or_else(|| CryptoError::NoKey(peer_id.to_string()))?;

        verify_signature(&keys.signing, bytes, signature).map_err(|e| {
            warn!(peer = %peer_id, error = %e, "signature verification failed");
            CryptoError::InvalidSignature
        })
    }

    // =========================================================================
    // ENCRYPTION
    // =========================================================================

    /// Hybrid-encrypt `bytes` for `recipient`.
    ///
    /// Needs no private key: anyone holding the recipient's public key can
    /// encrypt to it.
    pub fn encrypt(
        &self,
        bytes: &[u8],
        recipient: &EncryptionPublicKey,
    ) -> Result<SealedBody, CryptoError> {
        let sealed = hybrid::seal(bytes, recipient)?;
        debug!(size = bytes.len(), "body encrypted");
        Ok(sealed)
    }

    /// Hybrid-encrypt `bytes` for a peer known to the key store.
    pub fn encrypt_for(&self, peer_id: &AgentId, bytes: &[u8]) -> Result<SealedBody, CryptoError> {
        let keys = self
            .key_store
            .public_keys(peer_id)
            .ok_or_else(|| CryptoError::NoKey(peer_id.to_string()))?;
        self.encrypt(bytes, &keys.encryption)
    }

    /// Decrypt a body addressed to this agent.
    ///
    /// # Errors
    ///
    /// - `CryptoError::NoKey` if our key is absent or revoked
    /// - `CryptoError::DecryptFailed` on any authentication failure
    pub fn decrypt(&self, sealed: &SealedBody) -> Result<Vec<u8>, CryptoError> {
        let keys = self.own_keys()?;
        hybrid::open(sealed, keys.encryption())
    }

    /// Step one of [`encrypt`](Self::encrypt): wrap a content key.
    pub fn wrap_key(
        &self,
        content_key: &ContentKey,
        recipient: &EncryptionPublicKey,
    ) -> Result<WrappedKey, CryptoError> {
        hybrid::wrap_key(content_key, recipient)
    }

    /// Recover a content key wrapped for this agent.
    pub fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<ContentKey, CryptoError> {
        let keys = self.own_keys()?;
        hybrid::unwrap_key(wrapped, keys.encryption())
    }

    /// Step two of [`encrypt`](Self::encrypt): encrypt a body.
    pub fn encrypt_body(
        &self,
        content_key: &ContentKey,
        bytes: &[u8],
    ) -> Result<(Vec<u8>, Nonce), CryptoError> {
        hybrid::encrypt_body(content_key, bytes)
    }

    /// Inverse of [`encrypt_body`](Self::encrypt_body).
    pub fn decrypt_body(
        &self,
        content_key: &ContentKey,
        ciphertext: &[u8],
        nonce: &Nonce,
    ) -> Result<Vec<u8>, CryptoError> {
        hybrid::decrypt_body(content_key, ciphertext, nonce)
    }
}

impl std::fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoProvider")
            .field("agent_id", &self.agent_id)
            .finish_non_exhaustive()
    }
}
