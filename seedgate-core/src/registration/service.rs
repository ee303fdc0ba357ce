//! Registration service
//!
//! Drives each attempt through `Received → Verifying → Verified → SeedIssued`.
//! Nothing is sealed unless verification succeeded, and the seed is sealed to
//! the key taken from the verified identity, never to anything the caller
//! supplies directly.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::node_info::RegistrationNodeInfo;
use super::state::{RegistrationAttempt, RegistrationState};
use super::RegistrationError;
use crate::config::{ConfigError, RegistrationConfig};
use crate::seed::EncryptedSeed;
use crate::storage::SeedIssuer;
use crate::tee::attestation::{
    AttestationError, AttestationVerifier, Certificate, RevocationList, SignedReportVerifier,
    VerifiedIdentity,
};

/// Result of one registration together with the attempt's audit trail
#[derive(Debug)]
pub struct RegistrationOutcome {
    pub attempt: RegistrationAttempt,
    pub result: Result<RegistrationNodeInfo, RegistrationError>,
}

pub struct RegistrationService {
    verifier: Arc<dyn AttestationVerifier>,
    issuer: Arc<dyn SeedIssuer>,
    config: RegistrationConfig,
    permits: Arc<Semaphore>,
}

impl RegistrationService {
    /// Build around any verifier; `config` must pass
    /// [`RegistrationConfig::validate_limits`]
    pub fn new(
        verifier: Arc<dyn AttestationVerifier>,
        issuer: Arc<dyn SeedIssuer>,
        config: RegistrationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate_limits()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_registrations));
        Ok(Self {
            verifier,
            issuer,
            config,
            permits,
        })
    }

    /// Validate `config` and verify evidence with [`SignedReportVerifier`]
    /// under its attestation policy
    pub fn with_signed_reports(
        config: RegistrationConfig,
        issuer: Arc<dyn SeedIssuer>,
        revocations: RevocationList,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let verifier = SignedReportVerifier::new(config.attestation.clone(), revocations);
        Self::new(Arc::new(verifier), issuer, config)
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register and keep the attempt record
    pub async fn process(&self, certificate: Certificate) -> RegistrationOutcome {
        self.process_with_timeout(certificate, self.config.verification_timeout())
            .await
    }

    pub async fn process_with_timeout(
        &self,
        certificate: Certificate,
        timeout: Duration,
    ) -> RegistrationOutcome {
        let mut attempt = RegistrationAttempt::new();
        let result = self.run(&mut attempt, certificate, timeout).await;
        RegistrationOutcome { attempt, result }
    }

    pub async fn register(
        &self,
        certificate: Certificate,
    ) -> Result<RegistrationNodeInfo, RegistrationError> {
        self.process(certificate).await.result
    }

    pub async fn register_with_timeout(
        &self,
        certificate: Certificate,
        timeout: Duration,
    ) -> Result<RegistrationNodeInfo, RegistrationError> {
        self.process_with_timeout(certificate, timeout).await.result
    }

    /// Protobuf in, protobuf out
    pub async fn register_wire(&self, request: &[u8]) -> Result<Vec<u8>, RegistrationError> {
        let certificate = RegistrationNodeInfo::decode_request(request)?;
        let info = self.register(certificate).await?;
        Ok(info.encode_to_vec())
    }

    /// Register a batch concurrently; results are in input order
    pub async fn register_all(
        &self,
        certificates: Vec<Certificate>,
    ) -> Vec<Result<RegistrationNodeInfo, RegistrationError>> {
        join_all(certificates.into_iter().map(|cert| self.register(cert))).await
    }

    async fn run(
        &self,
        attempt: &mut RegistrationAttempt,
        certificate: Certificate,
        timeout: Duration,
    ) -> Result<RegistrationNodeInfo, RegistrationError> {
        let _permit = match self.acquire_permit().await {
            Ok(permit) => permit,
            Err(e) => {
                attempt.advance(RegistrationState::Rejected)?;
                warn!(
                    "[{}] No registration slot free after {}ms",
                    attempt.short_id(),
                    self.config.permit_wait_ms
                );
                return Err(e);
            }
        };

        attempt.advance(RegistrationState::Verifying)?;
        let identity = match self.verify(&certificate, timeout).await {
            Ok(identity) => identity,
            Err(e) => {
                attempt.advance(RegistrationState::Rejected)?;
                warn!("[{}] Evidence rejected: {}", attempt.short_id(), e);
                return Err(e.into());
            }
        };
        attempt.advance(RegistrationState::Verified)?;
        debug!(
            "[{}] Verified enclave {} (svn {})",
            attempt.short_id(),
            identity.public_key.short(),
            identity.measurement.isv_svn
        );

        let encrypted_seed = match self.issue(&identity) {
            Ok(sealed) => sealed,
            Err(e) => {
                attempt.advance(RegistrationState::Rejected)?;
                warn!("[{}] Seed issuance failed: {}", attempt.short_id(), e);
                return Err(e);
            }
        };
        attempt.advance(RegistrationState::SeedIssued)?;
        info!(
            "[{}] Seed issued to enclave {}",
            attempt.short_id(),
            identity.public_key.short()
        );

        Ok(RegistrationNodeInfo::issued(certificate, encrypted_seed))
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, RegistrationError> {
        let wait = self.config.permit_wait();
        match tokio::time::timeout(wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            _ => Err(RegistrationError::Busy),
        }
    }

    async fn verify(
        &self,
        certificate: &Certificate,
        timeout: Duration,
    ) -> Result<VerifiedIdentity, AttestationError> {
        tokio::time::timeout(timeout, self.verifier.verify(certificate))
            .await
            .unwrap_or(Err(AttestationError::VerificationTimeout))
    }

    fn issue(&self, identity: &VerifiedIdentity) -> Result<EncryptedSeed, RegistrationError> {
        // One generation handle for the whole issuance
        let generation = self.issuer.current_seed()?;
        Ok(self
            .issuer
            .encrypt_for(&generation.seed, &identity.public_key)?)
    }
}
