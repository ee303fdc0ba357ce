//! Registration — attestation-gated seed issuance
//!
//! A candidate node submits attestation evidence. If the evidence verifies,
//! it gets back the master seed sealed to the enclave key bound into that
//! evidence; otherwise it gets a typed rejection and nothing else.

pub mod node_info;
pub mod service;
pub mod state;

pub use node_info::RegistrationNodeInfo;
pub use service::{RegistrationOutcome, RegistrationService};
pub use state::{RegistrationAttempt, RegistrationState};

use crate::seed::SeedError;
use crate::tee::attestation::AttestationError;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Attestation rejected: {0}")]
    Attestation(#[from] AttestationError),

    #[error("Seed issuance failed: {0}")]
    Seed(#[from] SeedError),

    #[error("Registration capacity exhausted")]
    Busy,

    #[error("Malformed registration request: {0}")]
    MalformedRequest(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: RegistrationState,
        to: RegistrationState,
    },
}
