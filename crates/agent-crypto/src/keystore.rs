//! # Key Store Boundary
//!
//! The core never owns key provisioning. It asks a [`KeyStore`] for the
//! agent's private keys and for peers' public keys at the moment of use, so
//! revocation in the store takes effect on the next operation.
//!
//! [`InMemoryKeyStore`] is the in-process implementation; persistence and
//! rotation belong to whatever populates it.

use crate::hybrid::EncryptionKeyPair;
use crate::signatures::AgentSigningKey;
use crate::CryptoError;
use agent_types::{AgentId, PublicKeyBundle, YardUid};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Private key material of one agent: Ed25519 for signing, X25519 for
/// unwrapping content keys. Both halves zeroize on drop.
pub struct AgentKeys {
    signing: AgentSigningKey,
    encryption: EncryptionKeyPair,
}

impl AgentKeys {
    /// Generate a fresh key pair set.
    pub fn generate() -> Self {
        Self {
            signing: AgentSigningKey::generate(),
            encryption: EncryptionKeyPair::generate(),
        }
    }

    /// Restore from secret seeds.
    pub fn from_seeds(signing_seed: [u8; 32], encryption_secret: [u8; 32]) -> Self {
        Self {
            signing: AgentSigningKey::from_seed(signing_seed),
            encryption: EncryptionKeyPair::from_bytes(encryption_secret),
        }
    }

    /// Public halves, as published at checkin.
    pub fn public_bundle(&self) -> PublicKeyBundle {
        PublicKeyBundle {
            signing: self.signing.public_key(),
            encryption: self.encryption.public_key(),
        }
    }

    /// Signing half.
    pub fn signing(&self) -> &AgentSigningKey {
        &self.signing
    }

    /// Encryption half.
    pub fn encryption(&self) -> &EncryptionKeyPair {
        &self.encryption
    }
}

impl std::fmt::Debug for AgentKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentKeys")
            .field("public", &self.public_bundle())
            .finish_non_exhaustive()
    }
}

/// Lookup interface for key material.
///
/// Implementations might:
/// - Hold keys loaded at startup (see [`InMemoryKeyStore`])
/// - Proxy to a hardware module or OS keychain
/// - Query a key management service
pub trait KeyStore: Send + Sync {
    /// Private keys of a local agent.
    ///
    /// `None` when the agent has no keys or they were revoked.
    fn private_keys(&self, agent_id: &AgentId) -> Option<Arc<AgentKeys>>;

    /// Public keys of a peer (the orchestrator or another agent).
    ///
    /// `None` when the peer is unknown.
    fn public_keys(&self, peer_id: &AgentId) -> Option<PublicKeyBundle>;

    /// Record keys a peer announced at runtime, unless some are already
    /// provisioned. Returns `true` if installed.
    ///
    /// Read-only stores keep the default and refuse.
    fn install_peer_keys(&self, _peer_id: &AgentId, _keys: PublicKeyBundle) -> bool {
        false
    }
}

/// Thread-safe in-memory key store.
#[derive(Default)]
pub struct InMemoryKeyStore {
    private: RwLock<HashMap<AgentId, Arc<AgentKeys>>>,
    public: RwLock<HashMap<AgentId, PublicKeyBundle>>,
}

impl InMemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision private keys for a local agent, replacing any previous set.
    pub fn insert_private(&self, agent_id: AgentId, keys: AgentKeys) {
        self.private.write().insert(agent_id, Arc::new(keys));
    }

    /// Revoke a local agent's private keys.
    ///
    /// Returns `true` if keys were present.
    pub fn revoke_private(&self, agent_id: &AgentId) -> bool {
        self.private.write().remove(agent_id).is_some()
    }

    /// Install or replace a peer's public keys.
    pub fn install_public(&self, peer_id: AgentId, keys: PublicKeyBundle) {
        self.public.write().insert(peer_id, keys);
    }

    /// Install a peer's public keys only if none are present.
    ///
    /// Returns `true` if the keys were installed.
    pub fn install_public_if_absent(&self, peer_id: AgentId, keys: PublicKeyBundle) -> bool {
        let mut public = self.public.write();
        if public.contains_key(&peer_id) {
            return false;
        }
        public.insert(peer_id, keys);
        true
    }
}

impl KeyStore for InMemoryKeyStore {
    fn private_keys(&self, agent_id: &AgentId) -> Option<Arc<AgentKeys>> {
        self.private.read().get(agent_id).cloned()
    }

    fn public_keys(&self, peer_id: &AgentId) -> Option<PublicKeyBundle> {
        self.public.read().get(peer_id).copied()
    }

    fn install_peer_keys(&self, peer_id: &AgentId, keys: PublicKeyBundle) -> bool {
        self.install_public_if_absent(peer_id.clone(), keys)
    }
}

/// Immutable identity of a provisioned agent.
///
/// The private keys stay in the key store; `agent_id` is the handle used to
/// reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    agent_id: AgentId,
    fleet_id: Option<YardUid>,
    public_keys: PublicKeyBundle,
}

impl AgentIdentity {
    /// Generate new keys for `agent_id`, store them, and return the identity.
    pub fn generate(
        agent_id: AgentId,
        fleet_id: Option<YardUid>,
        store: &InMemoryKeyStore,
    ) -> Self {
        let keys = AgentKeys::generate();
        let public_keys = keys.public_bundle();
        store.insert_private(agent_id.clone(), keys);
        tracing::debug!(agent_id = %agent_id, "generated agent key pair");
        Self {
            agent_id,
            fleet_id,
            public_keys,
        }
    }

    /// Build the identity of an agent whose keys are already provisioned.
    ///
    /// # Errors
    ///
    /// `CryptoError::NoKey` if the store has no private keys for `agent_id`.
    pub fn load(
        agent_id: AgentId,
        fleet_id: Option<YardUid>,
        store: &dyn KeyStore,
    ) -> Result<Self, CryptoError> {
        let keys = store
            .private_keys(&agent_id)
            .ok_or_else(|| CryptoError::NoKey(agent_id.to_string()))?;
        Ok(Self {
            public_keys: keys.public_bundle(),
            agent_id,
            fleet_id,
        })
    }

    /// Agent id, also the private key handle.
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Fleet (yard) the agent was provisioned for, if known.
    pub fn fleet_id(&self) -> Option<&str> {
        self.fleet_id.as_deref()
    }

    /// Public keys distributed to the orchestrator.
    pub fn public_keys(&self) -> &PublicKeyBundle {
        &self.public_keys
    }
}
