//! Secure Channel — network-to-enclave seed sealing
//!
//! Derives a symmetric channel key between the network master key and an
//! attested enclave key, then seals seed payloads under it:
//! 1. X25519 key agreement (master secret × enclave public, or the reverse)
//! 2. Key derivation bound to both public keys
//! 3. AEAD sealing with a random nonce prepended to the ciphertext
//!
//! Two schemes are supported so that envelopes written before the current
//! format can still be opened:
//!
//! | Scheme  | Version | KDF                         | AEAD               | Sealed seed |
//! |---------|---------|-----------------------------|--------------------|-------------|
//! | Legacy  | 1       | SHA-256(label ‖ shared)     | ChaCha20-Poly1305  | 60 bytes    |
//! | Current | 2       | HKDF-SHA256(salt = M ‖ N)   | XChaCha20-Poly1305 | 72 bytes    |

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::enclave::EnclavePublicKey;
use crate::seed::SEED_SIZE;

/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

const LEGACY_NONCE_SIZE: usize = 12;
const CURRENT_NONCE_SIZE: usize = 24;

const LEGACY_KDF_LABEL: &[u8] = b"seedgate-seed-v1";
const CURRENT_HKDF_INFO: &[u8] = b"seedgate-seed-v2";

/// Crypto scheme used to seal a seed payload, selected by envelope version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedScheme {
    /// SHA-256 derived key, ChaCha20-Poly1305
    Legacy,
    /// HKDF-SHA256 derived key, XChaCha20-Poly1305
    Current,
}

impl SeedScheme {
    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(SeedScheme::Legacy),
            2 => Some(SeedScheme::Current),
            _ => None,
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            SeedScheme::Legacy => 1,
            SeedScheme::Current => 2,
        }
    }

    pub fn nonce_size(&self) -> usize {
        match self {
            SeedScheme::Legacy => LEGACY_NONCE_SIZE,
            SeedScheme::Current => CURRENT_NONCE_SIZE,
        }
    }

    /// Length of a sealed master seed under this scheme
    pub fn sealed_seed_size(&self) -> usize {
        self.nonce_size() + SEED_SIZE + TAG_SIZE
    }
}

/// Symmetric channel key, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
struct ChannelKey([u8; 32]);

/// A one-directional sealing context between the network and one enclave
pub struct SecureChannel {
    scheme: SeedScheme,
    key: ChannelKey,
}

impl SecureChannel {
    /// Network side: master secret towards an attested enclave key
    pub fn to_enclave(
        scheme: SeedScheme,
        master_secret: &StaticSecret,
        enclave_key: &EnclavePublicKey,
    ) -> Result<Self, ChannelError> {
        let master_public = EnclavePublicKey::from(PublicKey::from(master_secret));
        Self::derive(scheme, master_secret, enclave_key, &master_public, enclave_key)
    }

    /// Enclave side: enclave secret towards the network master key
    pub fn from_network(
        scheme: SeedScheme,
        enclave_secret: &StaticSecret,
        master_key: &EnclavePublicKey,
    ) -> Result<Self, ChannelError> {
        let enclave_public = EnclavePublicKey::from(PublicKey::from(enclave_secret));
        Self::derive(scheme, enclave_secret, master_key, master_key, &enclave_public)
    }

    pub fn scheme(&self) -> SeedScheme {
        self.scheme
    }

    /// Seal a payload; output is `nonce ‖ ciphertext ‖ tag`
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let aad = self.scheme.version().to_le_bytes();
        let (nonce, ciphertext) = match self.scheme {
            SeedScheme::Legacy => {
                let cipher = ChaCha20Poly1305::new_from_slice(&self.key.0)
                    .map_err(|e| ChannelError::Seal(format!("cipher init failed: {e}")))?;
                let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
                let ct = cipher
                    .encrypt(&nonce, plaintext)
                    .map_err(|e| ChannelError::Seal(e.to_string()))?;
                (nonce.to_vec(), ct)
            }
            SeedScheme::Current => {
                let cipher = XChaCha20Poly1305::new_from_slice(&self.key.0)
                    .map_err(|e| ChannelError::Seal(format!("cipher init failed: {e}")))?;
                let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
                let payload = Payload {
                    msg: plaintext,
                    aad: &aad,
                };
                let ct = cipher
                    .encrypt(&nonce, payload)
                    .map_err(|e| ChannelError::Seal(e.to_string()))?;
                (nonce.to_vec(), ct)
            }
        };

        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a payload produced by [`SecureChannel::seal`] under the same scheme
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let nonce_size = self.scheme.nonce_size();
        let min = nonce_size + TAG_SIZE;
        if sealed.len() < min {
            return Err(ChannelError::Truncated {
                len: sealed.len(),
                min,
            });
        }
        let (nonce, ciphertext) = sealed.split_at(nonce_size);

        match self.scheme {
            SeedScheme::Legacy => {
                let cipher = ChaCha20Poly1305::new_from_slice(&self.key.0)
                    .map_err(|e| ChannelError::Open(format!("cipher init failed: {e}")))?;
                cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|e| ChannelError::Open(e.to_string()))
            }
            SeedScheme::Current => {
                let cipher = XChaCha20Poly1305::new_from_slice(&self.key.0)
                    .map_err(|e| ChannelError::Open(format!("cipher init failed: {e}")))?;
                let aad = self.scheme.version().to_le_bytes();
                let payload = Payload {
                    msg: ciphertext,
                    aad: &aad,
                };
                cipher
                    .decrypt(XNonce::from_slice(nonce), payload)
                    .map_err(|e| ChannelError::Open(e.to_string()))
            }
        }
    }

    fn derive(
        scheme: SeedScheme,
        local_secret: &StaticSecret,
        remote: &EnclavePublicKey,
        network_key: &EnclavePublicKey,
        enclave_key: &EnclavePublicKey,
    ) -> Result<Self, ChannelError> {
        let shared = local_secret.diffie_hellman(&remote.to_x25519());
        // Low-order points give an all-zero secret that any party can compute
        if !shared.was_contributory() {
            return Err(ChannelError::NonContributory);
        }

        let mut key = ChannelKey([0u8; 32]);
        match scheme {
            SeedScheme::Legacy => {
                let mut h = Sha256::new();
                h.update(LEGACY_KDF_LABEL);
                h.update(shared.as_bytes());
                key.0.copy_from_slice(&h.finalize());
            }
            SeedScheme::Current => {
                let mut salt = [0u8; 64];
                salt[..32].copy_from_slice(network_key.as_bytes());
                salt[32..].copy_from_slice(enclave_key.as_bytes());
                let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
                hk.expand(CURRENT_HKDF_INFO, &mut key.0)
                    .map_err(|_| ChannelError::Seal("HKDF expansion failed".into()))?;
            }
        }

        Ok(Self { scheme, key })
    }
}

/// Channel derivation and sealing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid public key: expected 32 bytes, got {0}")]
    InvalidPublicKey(usize),

    #[error("Key agreement produced a non-contributory shared secret")]
    NonContributory,

    #[error("Sealing failed: {0}")]
    Seal(String),

    #[error("Opening failed: {0}")]
    Open(String),

    #[error("Sealed payload too short: {len} < {min}")]
    Truncated { len: usize, min: usize },
}
