//! # Hybrid Encryption
//!
//! Per-message content key, wrapped for the recipient with X25519.
//!
//! Two explicit steps, usable and testable on their own:
//!
//! 1. [`wrap_key`]: ephemeral X25519 agreement with the recipient's public
//!    key, HKDF-SHA256 to a key-encryption key, AEAD over the content key.
//! 2. [`encrypt_body`]: AEAD over the body with the content key.
//!
//! Asymmetric cost is one agreement per message regardless of body size.

use crate::symmetric::{self, ContentKey, Nonce};
use crate::CryptoError;
use agent_types::{EncryptionPublicKey, SealedBody};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// HKDF info string for key-encryption keys.
const KEY_WRAP_INFO: &[u8] = b"fleet-agent/key-wrap/v1";

/// A content key encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    /// Sender's one-time X25519 public key.
    pub ephemeral_public_key: EncryptionPublicKey,
    /// Nonce of the wrap AEAD.
    pub nonce: Nonce,
    /// Encrypted content key (32 bytes + 16 byte tag).
    pub ciphertext: Vec<u8>,
}

/// Static X25519 key pair used to unwrap content keys addressed to us.
pub struct EncryptionKeyPair {
    secret: StaticSecret,
}

impl EncryptionKeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(rand::thread_rng()),
        }
    }

    /// Create from secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    /// Get public key.
    pub fn public_key(&self) -> EncryptionPublicKey {
        PublicKey::from(&self.secret).to_bytes()
    }
}

/// Step 1: wrap `content_key` for the holder of `recipient`.
pub fn wrap_key(
    content_key: &ContentKey,
    recipient: &EncryptionPublicKey,
) -> Result<WrappedKey, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();

    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient));
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidPublicKey);
    }

    let kek = derive_kek(shared.as_bytes(), &ephemeral_public, recipient)?;
    let aad = wrap_aad(&ephemeral_public, recipient);
    let (ciphertext, nonce) = symmetric::encrypt(&kek, content_key.as_bytes(), &aad)?;

    Ok(WrappedKey {
        ephemeral_public_key: ephemeral_public,
        nonce,
        ciphertext,
    })
}

/// Inverse of [`wrap_key`] using our static key.
pub fn unwrap_key(
    wrapped: &WrappedKey,
    own: &EncryptionKeyPair,
) -> Result<ContentKey, CryptoError> {
    let own_public = own.public_key();
    let shared = own
        .secret
        .diffie_hellman(&PublicKey::from(wrapped.ephemeral_public_key));
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptFailed);
    }

    let kek = derive_kek(shared.as_bytes(), &wrapped.ephemeral_public_key, &own_public)
        .map_err(|_| CryptoError::DecryptFailed)?;
    let aad = wrap_aad(&wrapped.ephemeral_public_key, &own_public);
    let key_bytes = Zeroizing::new(symmetric::decrypt(
        &kek,
        &wrapped.ciphertext,
        &wrapped.nonce,
        &aad,
    )?);

    ContentKey::from_slice(&key_bytes).map_err(|_| CryptoError::DecryptFailed)
}

/// Step 2: encrypt a body with the content key.
pub fn encrypt_body(
    content_key: &ContentKey,
    plaintext: &[u8],
) -> Result<(Vec<u8>, Nonce), CryptoError> {
    symmetric::encrypt(content_key, plaintext, &[])
}

/// Inverse of [`encrypt_body`].
pub fn decrypt_body(
    content_key: &ContentKey,
    ciphertext: &[u8],
    nonce: &Nonce,
) -> Result<Vec<u8>, CryptoError> {
    symmetric::decrypt(content_key, ciphertext, nonce, &[])
}

/// Both steps with a fresh content key, packed as a wire `SealedBody`.
pub fn seal(plaintext: &[u8], recipient: &EncryptionPublicKey) -> Result<SealedBody, CryptoError> {
    let content_key = ContentKey::generate();
    let wrapped = wrap_key(&content_key, recipient)?;
    let (ciphertext, body_nonce) = encrypt_body(&content_key, plaintext)?;

    Ok(SealedBody {
        ephemeral_public_key: wrapped.ephemeral_public_key,
        key_nonce: *wrapped.nonce.as_bytes(),
        wrapped_key: wrapped.ciphertext,
        body_nonce: *body_nonce.as_bytes(),
        ciphertext,
    })
}

/// Inverse of [`seal`]. Any failure is `DecryptFailed`.
pub fn open(sealed: &SealedBody, own: &EncryptionKeyPair) -> Result<Vec<u8>, CryptoError> {
    let wrapped = WrappedKey {
        ephemeral_public_key: sealed.ephemeral_public_key,
        nonce: Nonce::from_bytes(sealed.key_nonce),
        ciphertext: sealed.wrapped_key.clone(),
    };
    let content_key = unwrap_key(&wrapped, own)?;
    decrypt_body(
        &content_key,
        &sealed.ciphertext,
        &Nonce::from_bytes(sealed.body_nonce),
    )
}

fn derive_kek(
    shared_secret: &[u8; 32],
    ephemeral_public: &EncryptionPublicKey,
    recipient: &EncryptionPublicKey,
) -> Result<ContentKey, CryptoError> {
    let salt = wrap_aad(ephemeral_public, recipient);
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(KEY_WRAP_INFO, okm.as_mut())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    Ok(ContentKey::from_bytes(*okm))
}

fn wrap_aad(ephemeral_public: &EncryptionPublicKey, recipient: &EncryptionPublicKey) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(ephemeral_public);
    aad[32..].copy_from_slice(recipient);
    aad
}
