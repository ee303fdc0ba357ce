//! Seedgate — attestation-gated master seed registration
//!
//! A new node proves through remote attestation that it runs trusted enclave
//! code, and in return receives the network's master seed sealed to a key only
//! that enclave holds. Evidence that fails any check gets nothing.

pub mod config;
pub mod network;
pub mod registration;
pub mod seed;
pub mod storage;
pub mod tee;

pub use config::{ConfigError, RegistrationConfig};
pub use registration::{RegistrationError, RegistrationNodeInfo, RegistrationService};
pub use seed::{EncryptedSeed, EnvelopeFormat, SeedEnvelope, SeedError, SeedMaterial};
pub use storage::{SeedIssuer, SeedStore};
pub use tee::{
    AttestationError, AttestationVerifier, Certificate, EnclaveKeyPair, EnclavePublicKey,
    SignedReportVerifier,
};
