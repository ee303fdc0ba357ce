//! Remote Attestation — verify a candidate enclave before it gets the seed
//!
//! The registration core consumes attestation through the [`AttestationVerifier`]
//! trait: evidence in, verified identity (measurement + enclave public key) or a
//! typed rejection out. Real deployments plug the hardware vendor's verification
//! library in behind it.
//!
//! [`SignedReportVerifier`] is the in-tree implementation. It checks reports of
//! the form produced by [`ReportSigner`]:
//! 1. Report decodes and is signed by a trusted attestation authority
//! 2. Platform is not revoked and the report is fresh
//! 3. Measurement satisfies the [`AttestationPolicy`]
//! 4. Report data carries a usable enclave public key

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use prost::Message;
use serde::{Deserialize, Serialize};

use super::enclave::{EnclaveMeasurement, EnclavePublicKey, PUBLIC_KEY_SIZE};
use crate::network::protocol::{AttestationReport, ReportBody};

/// Raw attestation evidence submitted by a candidate node.
///
/// A distinct type so evidence is never mixed up with ciphertext or other
/// binary payloads.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate({} bytes)", self.0.len())
    }
}

/// Identity extracted from evidence that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Enclave key the seed will be sealed to
    pub public_key: EnclavePublicKey,
    pub measurement: EnclaveMeasurement,
    pub platform_id: Vec<u8>,
    pub issued_at: DateTime<Utc>,
}

/// Why a piece of evidence was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    #[error("Malformed evidence: {0}")]
    MalformedEvidence(String),

    #[error("Untrusted attestation authority: {0}")]
    UntrustedAuthority(String),

    #[error("Evidence revoked or stale: {0}")]
    Revoked(String),

    #[error("Measurement mismatch: {0}")]
    MeasurementMismatch(String),

    #[error("Verification timed out")]
    VerificationTimeout,
}

/// Pluggable attestation check
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify(&self, evidence: &Certificate) -> Result<VerifiedIdentity, AttestationError>;
}

/// Policy for accepting or rejecting attestation reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationPolicy {
    /// Ed25519 keys of attestation authorities (hex). Empty = trust nobody.
    pub trusted_authorities: Vec<String>,
    /// Trusted MRENCLAVE values (empty = accept any)
    pub trusted_enclaves: Vec<String>,
    /// Trusted MRSIGNER values (empty = accept any)
    pub trusted_signers: Vec<String>,
    /// Minimum security version number
    pub min_svn: u16,
    /// Maximum age of a report in seconds
    pub max_report_age_secs: i64,
    /// Tolerated clock drift for reports dated in the future
    pub max_clock_skew_secs: i64,
}

impl Default for AttestationPolicy {
    fn default() -> Self {
        Self {
            trusted_authorities: Vec::new(),
            trusted_enclaves: Vec::new(),
            trusted_signers: Vec::new(),
            min_svn: 0,
            max_report_age_secs: 3600,
            max_clock_skew_secs: 60,
        }
    }
}

impl AttestationPolicy {
    /// Strict policy: pinned authority, enclave and signer, short freshness window
    pub fn strict(authority: String, enclave: String, signer: String, min_svn: u16) -> Self {
        Self {
            trusted_authorities: vec![authority],
            trusted_enclaves: vec![enclave],
            trusted_signers: vec![signer],
            min_svn,
            max_report_age_secs: 300,
            max_clock_skew_secs: 30,
        }
    }

    pub fn trusting(authority: &VerifyingKey) -> Self {
        Self {
            trusted_authorities: vec![hex::encode(authority.as_bytes())],
            ..Self::default()
        }
    }
}

/// Revoked platform ids, shared with whatever feeds revocation updates
#[derive(Debug, Clone, Default)]
pub struct RevocationList {
    revoked: Arc<RwLock<HashSet<Vec<u8>>>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, platform_id: &[u8]) {
        self.revoked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(platform_id.to_vec());
    }

    pub fn is_revoked(&self, platform_id: &[u8]) -> bool {
        self.revoked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(platform_id)
    }

    pub fn len(&self) -> usize {
        self.revoked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verifies authority-signed attestation reports against a policy
#[derive(Debug, Clone)]
pub struct SignedReportVerifier {
    policy: AttestationPolicy,
    revocations: RevocationList,
}

impl SignedReportVerifier {
    pub fn new(policy: AttestationPolicy, revocations: RevocationList) -> Self {
        Self {
            policy,
            revocations,
        }
    }

    pub fn policy(&self) -> &AttestationPolicy {
        &self.policy
    }

    /// Run all checks against the current clock
    pub fn verify_report(&self, evidence: &Certificate) -> Result<VerifiedIdentity, AttestationError> {
        self.verify_report_at(evidence, Utc::now())
    }

    pub fn verify_report_at(
        &self,
        evidence: &Certificate,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AttestationError> {
        let policy = &self.policy;

        // 1. Decode the signed envelope
        let report = AttestationReport::decode(evidence.as_bytes())
            .map_err(|e| AttestationError::MalformedEvidence(format!("report: {e}")))?;
        if report.body.is_empty() || report.signature.is_empty() {
            return Err(AttestationError::MalformedEvidence(
                "empty report body or signature".into(),
            ));
        }

        // 2. Authority must be trusted and its signature must hold
        let authority_hex = hex::encode(&report.authority_key);
        if !policy.trusted_authorities.contains(&authority_hex) {
            return Err(AttestationError::UntrustedAuthority(format!(
                "authority {} not in trusted list",
                &authority_hex[..16.min(authority_hex.len())]
            )));
        }
        let authority = <[u8; 32]>::try_from(report.authority_key.as_slice())
            .ok()
            .and_then(|bytes| VerifyingKey::from_bytes(&bytes).ok())
            .ok_or_else(|| AttestationError::UntrustedAuthority("invalid authority key".into()))?;
        let signature = Signature::from_slice(&report.signature)
            .map_err(|_| AttestationError::MalformedEvidence("signature length".into()))?;
        authority
            .verify_strict(&report.body, &signature)
            .map_err(|_| AttestationError::UntrustedAuthority("report signature mismatch".into()))?;

        // 3. Decode the signed claims
        let body = ReportBody::decode(report.body.as_slice())
            .map_err(|e| AttestationError::MalformedEvidence(format!("report body: {e}")))?;

        // 4. Revocation and freshness
        if self.revocations.is_revoked(&body.platform_id) {
            return Err(AttestationError::Revoked(format!(
                "platform {} revoked",
                hex::encode(&body.platform_id)
            )));
        }
        let issued_at = Utc
            .timestamp_opt(body.issued_at, 0)
            .single()
            .ok_or_else(|| AttestationError::MalformedEvidence("issued_at out of range".into()))?;
        let age = (now - issued_at).num_seconds();
        if age > policy.max_report_age_secs {
            return Err(AttestationError::Revoked(format!(
                "report is stale: {}s old, max {}s",
                age, policy.max_report_age_secs
            )));
        }
        if -age > policy.max_clock_skew_secs {
            return Err(AttestationError::MalformedEvidence(format!(
                "report dated {}s in the future",
                -age
            )));
        }

        // 5. Measurement policy
        let measurement = EnclaveMeasurement {
            mrenclave: hex::encode(&body.mr_enclave),
            mrsigner: hex::encode(&body.mr_signer),
            isv_svn: u16::try_from(body.isv_svn).map_err(|_| {
                AttestationError::MalformedEvidence(format!("isv_svn {} out of range", body.isv_svn))
            })?,
        };
        if !policy.trusted_enclaves.is_empty()
            && !policy.trusted_enclaves.contains(&measurement.mrenclave)
        {
            return Err(AttestationError::MeasurementMismatch(
                "MRENCLAVE not in trusted list".into(),
            ));
        }
        if !policy.trusted_signers.is_empty()
            && !policy.trusted_signers.contains(&measurement.mrsigner)
        {
            return Err(AttestationError::MeasurementMismatch(
                "MRSIGNER not in trusted list".into(),
            ));
        }
        if measurement.isv_svn < policy.min_svn {
            return Err(AttestationError::MeasurementMismatch(format!(
                "SVN {} below minimum {}",
                measurement.isv_svn, policy.min_svn
            )));
        }

        // 6. Enclave key bound into the report
        if body.report_data.len() < PUBLIC_KEY_SIZE {
            return Err(AttestationError::MalformedEvidence(format!(
                "report data too short for a public key: {} bytes",
                body.report_data.len()
            )));
        }
        let public_key = EnclavePublicKey::try_from(&body.report_data[..PUBLIC_KEY_SIZE])
            .map_err(|e| AttestationError::MalformedEvidence(e.to_string()))?;

        Ok(VerifiedIdentity {
            public_key,
            measurement,
            platform_id: body.platform_id,
            issued_at,
        })
    }
}

#[async_trait]
impl AttestationVerifier for SignedReportVerifier {
    async fn verify(&self, evidence: &Certificate) -> Result<VerifiedIdentity, AttestationError> {
        self.verify_report(evidence)
    }
}

/// Produces signed attestation reports.
///
/// Stands in for the platform quoting enclave plus attestation service: it
/// binds an enclave measurement and public key into a report and signs it.
pub struct ReportSigner {
    signing_key: SigningKey,
}

impl ReportSigner {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a report for an enclave, dated now
    pub fn attest(
        &self,
        measurement: &EnclaveMeasurement,
        enclave_key: &EnclavePublicKey,
        platform_id: &[u8],
    ) -> Result<Certificate, AttestationError> {
        self.attest_at(measurement, enclave_key, platform_id, Utc::now())
    }

    /// Measurements must be hex, as produced by [`EnclaveMeasurement::compute`]
    pub fn attest_at(
        &self,
        measurement: &EnclaveMeasurement,
        enclave_key: &EnclavePublicKey,
        platform_id: &[u8],
        issued_at: DateTime<Utc>,
    ) -> Result<Certificate, AttestationError> {
        let mr_enclave = hex::decode(&measurement.mrenclave)
            .map_err(|e| AttestationError::MalformedEvidence(format!("mrenclave: {e}")))?;
        let mr_signer = hex::decode(&measurement.mrsigner)
            .map_err(|e| AttestationError::MalformedEvidence(format!("mrsigner: {e}")))?;
        let body = ReportBody {
            mr_enclave,
            mr_signer,
            isv_svn: u32::from(measurement.isv_svn),
            report_data: enclave_key.as_bytes().to_vec(),
            platform_id: platform_id.to_vec(),
            issued_at: issued_at.timestamp(),
        };
        Ok(self.sign_body(&body))
    }

    /// Sign an arbitrary report body
    pub fn sign_body(&self, body: &ReportBody) -> Certificate {
        let body = body.encode_to_vec();
        let signature = self.signing_key.sign(&body);
        let report = AttestationReport {
            body,
            signature: signature.to_bytes().to_vec(),
            authority_key: self.signing_key.verifying_key().to_bytes().to_vec(),
        };
        Certificate::new(report.encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tee::enclave::EnclaveKeyPair;

    fn setup() -> (ReportSigner, EnclaveMeasurement, EnclaveKeyPair) {
        (
            ReportSigner::generate(),
            EnclaveMeasurement::compute("seedgate-enclave", "seedgate-signer", 2),
            EnclaveKeyPair::generate(),
        )
    }

    #[test]
    fn test_generate_and_verify_report() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"platform-1").unwrap();

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        let identity = verifier.verify_report(&cert).unwrap();
        assert_eq!(identity.public_key, node.public_key());
        assert_eq!(identity.measurement, measurement);
        assert_eq!(identity.platform_id, b"platform-1");
    }

    #[test]
    fn test_corrupted_signature_byte() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"p").unwrap();

        let mut report = AttestationReport::decode(cert.as_bytes()).unwrap();
        report.signature[0] ^= 0x01;
        let tampered = Certificate::new(report.encode_to_vec());

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        assert!(matches!(
            verifier.verify_report(&tampered),
            Err(AttestationError::UntrustedAuthority(_))
        ));
    }

    #[test]
    fn test_unknown_authority() {
        let (signer, measurement, node) = setup();
        let rogue = ReportSigner::generate();
        let cert = rogue.attest(&measurement, &node.public_key(), b"p").unwrap();

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::UntrustedAuthority(_))
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let verifier = SignedReportVerifier::new(AttestationPolicy::default(), RevocationList::new());
        let result = verifier.verify_report(&Certificate::new(vec![0xFF, 0xFF, 0xFF]));
        assert!(matches!(result, Err(AttestationError::MalformedEvidence(_))));

        let result = verifier.verify_report(&Certificate::new(Vec::new()));
        assert!(matches!(result, Err(AttestationError::MalformedEvidence(_))));
    }

    #[test]
    fn test_revoked_platform() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"bad-platform").unwrap();

        let revocations = RevocationList::new();
        revocations.revoke(b"bad-platform");
        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            revocations,
        );
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::Revoked(_))
        ));
    }

    #[test]
    fn test_stale_report() {
        let (signer, measurement, node) = setup();
        let issued = Utc::now() - chrono::Duration::hours(2);
        let cert = signer.attest_at(&measurement, &node.public_key(), b"p", issued).unwrap();

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()), // max 3600s
            RevocationList::new(),
        );
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::Revoked(_))
        ));
    }

    #[test]
    fn test_future_dated_report() {
        let (signer, measurement, node) = setup();
        let issued = Utc::now() + chrono::Duration::hours(1);
        let cert = signer.attest_at(&measurement, &node.public_key(), b"p", issued).unwrap();

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::MalformedEvidence(_))
        ));
    }

    #[test]
    fn test_measurement_policy() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"p").unwrap();
        let authority = hex::encode(signer.verifying_key().as_bytes());

        let pinned = AttestationPolicy::strict(
            authority.clone(),
            measurement.mrenclave.clone(),
            measurement.mrsigner.clone(),
            2,
        );
        let verifier = SignedReportVerifier::new(pinned, RevocationList::new());
        assert!(verifier.verify_report(&cert).is_ok());

        let other = EnclaveMeasurement::compute("other-code", "seedgate-signer", 2);
        let wrong_enclave =
            AttestationPolicy::strict(authority.clone(), other.mrenclave, measurement.mrsigner.clone(), 2);
        let verifier = SignedReportVerifier::new(wrong_enclave, RevocationList::new());
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::MeasurementMismatch(_))
        ));

        let high_svn = AttestationPolicy::strict(
            authority,
            measurement.mrenclave.clone(),
            measurement.mrsigner.clone(),
            99,
        );
        let verifier = SignedReportVerifier::new(high_svn, RevocationList::new());
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::MeasurementMismatch(_))
        ));
    }

    #[test]
    fn test_missing_enclave_key() {
        let (signer, measurement, _) = setup();
        let body = ReportBody {
            mr_enclave: hex::decode(&measurement.mrenclave).unwrap(),
            mr_signer: hex::decode(&measurement.mrsigner).unwrap(),
            isv_svn: 2,
            report_data: vec![1, 2, 3],
            platform_id: b"p".to_vec(),
            issued_at: Utc::now().timestamp(),
        };
        let cert = signer.sign_body(&body);

        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        assert!(matches!(
            verifier.verify_report(&cert),
            Err(AttestationError::MalformedEvidence(_))
        ));
    }

    #[test]
    fn test_non_hex_measurement_not_signed() {
        let (signer, mut measurement, node) = setup();
        measurement.mrenclave = "not-hex".into();
        assert!(matches!(
            signer.attest(&measurement, &node.public_key(), b"p"),
            Err(AttestationError::MalformedEvidence(_))
        ));

        let (_, mut measurement, _) = setup();
        measurement.mrsigner = "zz".into();
        assert!(signer.attest(&measurement, &node.public_key(), b"p").is_err());
    }

    #[test]
    fn test_verification_is_repeatable() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"p").unwrap();
        let verifier = SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        );
        let now = Utc::now();
        assert_eq!(
            verifier.verify_report_at(&cert, now),
            verifier.verify_report_at(&cert, now)
        );
    }

    #[tokio::test]
    async fn test_trait_object_verify() {
        let (signer, measurement, node) = setup();
        let cert = signer.attest(&measurement, &node.public_key(), b"p").unwrap();
        let verifier: Arc<dyn AttestationVerifier> = Arc::new(SignedReportVerifier::new(
            AttestationPolicy::trusting(&signer.verifying_key()),
            RevocationList::new(),
        ));
        let identity = verifier.verify(&cert).await.unwrap();
        assert_eq!(identity.public_key, node.public_key());
    }
}
