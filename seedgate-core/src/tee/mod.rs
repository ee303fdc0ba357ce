//! TEE (Trusted Execution Environment) — enclave trust for seed registration
//!
//! - **Enclave**: enclave key pairs, public keys and measurements
//! - **Attestation**: evidence verification behind a pluggable trait
//! - **Secure Channel**: key agreement and sealing between network and enclave

pub mod enclave;
pub mod attestation;
pub mod secure_channel;

pub use enclave::{EnclaveKeyPair, EnclaveMeasurement, EnclavePublicKey, PUBLIC_KEY_SIZE};
pub use attestation::{
    AttestationError, AttestationPolicy, AttestationVerifier, Certificate, ReportSigner,
    RevocationList, SignedReportVerifier, VerifiedIdentity,
};
pub use secure_channel::{ChannelError, SecureChannel, SeedScheme, TAG_SIZE};
