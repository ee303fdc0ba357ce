//! Seed material and sealed seed payloads

use chrono::{DateTime, Utc};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::tee::secure_channel::ChannelError;

/// Size of the master seed in bytes
pub const SEED_SIZE: usize = 32;

/// The plaintext master seed. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SeedMaterial([u8; SEED_SIZE]);

impl SeedMaterial {
    pub fn new(bytes: [u8; SEED_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random seed (genesis or rotation)
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, SeedError> {
        let bytes: [u8; SEED_SIZE] = slice
            .try_into()
            .map_err(|_| SeedError::InvalidSeedLength(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SeedMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SeedMaterial(<redacted>)")
    }
}

/// An immutable, versioned handle to one seed value.
///
/// Readers clone the `Arc` around this and keep using it even if the store
/// rotates underneath them, so a single encryption always sees one seed.
#[derive(Debug)]
pub struct SeedGeneration {
    pub seed: SeedMaterial,
    /// Monotonic generation counter, starting at 1 for genesis
    pub generation: u64,
    pub activated_at: DateTime<Utc>,
}

/// Seed ciphertext bound to one recipient key.
///
/// Kept distinct from attestation evidence and other byte payloads.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedSeed(Vec<u8>);

impl EncryptedSeed {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for EncryptedSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedSeed({} bytes)", self.0.len())
    }
}

/// Seed store and seed sealing errors
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Seed unavailable: store not initialized")]
    Unavailable,

    #[error("Seed store already initialized")]
    AlreadyInitialized,

    #[error("No legacy seed within the retention window")]
    LegacyUnavailable,

    #[error("Seed encryption failed: {0}")]
    Encryption(#[source] ChannelError),

    #[error("Seed decryption failed: {0}")]
    Decryption(#[source] ChannelError),

    #[error("Invalid seed length: expected {SEED_SIZE} bytes, got {0}")]
    InvalidSeedLength(usize),
}
