//! # Core Domain Entities
//!
//! Identities and key bundles shared by the agent and the orchestrator.
//!
//! ## Clusters
//!
//! - **Identity**: `AgentId`, `YardUid`, `AgentStatus`
//! - **Key Material (public half)**: `PublicKeyBundle`

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::fmt;
use uuid::Uuid;

/// A 32-byte Ed25519 verifying key.
pub type SigningPublicKey = [u8; 32];

/// A 32-byte X25519 public key used to wrap per-message content keys.
pub type EncryptionPublicKey = [u8; 32];

/// A 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// Identifier of the fleet orchestrator when it acts as a message peer.
pub const ORCHESTRATOR_ID: &str = "fleet-orchestrator";

// =============================================================================
// IDENTITY
// =============================================================================

/// Identifier of a message peer: an agent UUID or a fleet-assigned id.
///
/// The orchestrator also has an `AgentId` (see [`ORCHESTRATOR_ID`]) so that
/// envelope routing never needs a second identifier type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random UUID identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier of the fleet orchestrator.
    #[must_use]
    pub fn orchestrator() -> Self {
        Self(ORCHESTRATOR_ID.to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is a well-formed UUID.
    #[must_use]
    pub fn is_uuid(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for AgentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of the yard (site) an agent checks into.
pub type YardUid = String;

/// Operational status reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Idle and available for assignments.
    #[default]
    Free,
    /// Reserved for a mission and waiting for its assignment.
    Ready,
    /// Executing an assignment.
    Busy,
    /// Unable to operate.
    Failed,
}

impl AgentStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Free => "free",
            AgentStatus::Ready => "ready",
            AgentStatus::Busy => "busy",
            AgentStatus::Failed => "failed",
        }
    }
}

// =============================================================================
// KEY MATERIAL (PUBLIC HALF)
// =============================================================================

/// The public keys a peer distributes out of band or during checkin.
///
/// Both keys are hex-encoded on the wire.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    /// Ed25519 key verifying the peer's envelope signatures.
    #[serde_as(as = "Hex")]
    pub signing: SigningPublicKey,
    /// X25519 key used to wrap content keys for the peer.
    #[serde_as(as = "Hex")]
    pub encryption: EncryptionPublicKey,
}

/// Format marker sent alongside public keys in checkin requests.
pub const PUBLIC_KEY_FORMAT: &str = "raw-hex";
