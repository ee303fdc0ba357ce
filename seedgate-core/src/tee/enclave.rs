//! TEE Enclave — identity of a candidate enclave
//!
//! A joining node runs inside an enclave that holds an X25519 key pair. The
//! public half is embedded in its attestation report; the secret half never
//! leaves the enclave and is the only thing that can open the master seed the
//! network sends back.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use super::secure_channel::{ChannelError, SecureChannel, SeedScheme};
use crate::seed::{SeedError, SeedMaterial};

/// Size of an X25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// An X25519 public key, either the network master key or an enclave key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnclavePublicKey([u8; PUBLIC_KEY_SIZE]);

impl EnclavePublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, ChannelError> {
        let bytes = hex::decode(encoded).map_err(|_| ChannelError::InvalidPublicKey(0))?;
        Self::try_from(bytes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub(crate) fn to_x25519(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl TryFrom<&[u8]> for EnclavePublicKey {
    type Error = ChannelError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = slice
            .try_into()
            .map_err(|_| ChannelError::InvalidPublicKey(slice.len()))?;
        Ok(Self(bytes))
    }
}

impl From<PublicKey> for EnclavePublicKey {
    fn from(key: PublicKey) -> Self {
        Self(key.to_bytes())
    }
}

impl std::fmt::Debug for EnclavePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnclavePublicKey({})", self.to_hex())
    }
}

impl std::fmt::Display for EnclavePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The enclave-held key pair of a joining node
pub struct EnclaveKeyPair {
    secret: StaticSecret,
    public: EnclavePublicKey,
}

impl EnclaveKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        Self::from_secret(secret)
    }

    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = EnclavePublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    pub fn public_key(&self) -> EnclavePublicKey {
        self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Open a sealed master seed sent by the network
    pub fn open_seed(
        &self,
        scheme: SeedScheme,
        master_key: &EnclavePublicKey,
        sealed: &[u8],
    ) -> Result<SeedMaterial, SeedError> {
        let channel = SecureChannel::from_network(scheme, &self.secret, master_key)
            .map_err(SeedError::Decryption)?;
        let plaintext = channel.open(sealed).map_err(SeedError::Decryption)?;
        SeedMaterial::from_slice(&plaintext)
    }
}

impl std::fmt::Debug for EnclaveKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Measurement of enclave identity, as carried in an attestation report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveMeasurement {
    /// MRENCLAVE — hash of enclave code + data at build time (hex)
    pub mrenclave: String,
    /// MRSIGNER — hash of the signing key (hex)
    pub mrsigner: String,
    /// Security version number
    pub isv_svn: u16,
}

impl EnclaveMeasurement {
    /// Compute a measurement from a code identity and a signer identity
    pub fn compute(code_hash: &str, signer_key: &str, svn: u16) -> Self {
        let mrenclave = {
            let mut h = Sha256::new();
            h.update(code_hash.as_bytes());
            h.update(b"mrenclave-v1");
            hex::encode(h.finalize())
        };
        let mrsigner = {
            let mut h = Sha256::new();
            h.update(signer_key.as_bytes());
            h.update(b"mrsigner-v1");
            hex::encode(h.finalize())
        };
        Self {
            mrenclave,
            mrsigner,
            isv_svn: svn,
        }
    }
}
