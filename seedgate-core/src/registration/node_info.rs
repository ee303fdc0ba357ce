//! Join record exchanged with a candidate node

use prost::Message;

use super::RegistrationError;
use crate::network::protocol;
use crate::seed::EncryptedSeed;
use crate::tee::attestation::Certificate;

/// Attestation evidence paired with the seed sealed to the attested key.
///
/// Only the registration service builds one, after the evidence verified;
/// decoding refuses records without a seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationNodeInfo {
    certificate: Certificate,
    encrypted_seed: EncryptedSeed,
}

impl RegistrationNodeInfo {
    pub(crate) fn issued(certificate: Certificate, encrypted_seed: EncryptedSeed) -> Self {
        Self {
            certificate,
            encrypted_seed,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn encrypted_seed(&self) -> &EncryptedSeed {
        &self.encrypted_seed
    }

    pub fn into_parts(self) -> (Certificate, EncryptedSeed) {
        (self.certificate, self.encrypted_seed)
    }

    /// Decode a join request. Requests carry evidence only.
    pub fn decode_request(bytes: &[u8]) -> Result<Certificate, RegistrationError> {
        let wire = protocol::RegistrationNodeInfo::decode(bytes)
            .map_err(|e| RegistrationError::MalformedRequest(e.to_string()))?;
        if !wire.encrypted_seed.is_empty() {
            return Err(RegistrationError::MalformedRequest(
                "request already carries an encrypted seed".into(),
            ));
        }
        if wire.certificate.is_empty() {
            return Err(RegistrationError::MalformedRequest(
                "request carries no certificate".into(),
            ));
        }
        Ok(Certificate::new(wire.certificate))
    }

    /// Encode a join request for `certificate`
    pub fn encode_request(certificate: &Certificate) -> Vec<u8> {
        protocol::RegistrationNodeInfo {
            certificate: certificate.as_bytes().to_vec(),
            encrypted_seed: Vec::new(),
        }
        .encode_to_vec()
    }

    /// Decode a join response
    pub fn decode(bytes: &[u8]) -> Result<Self, RegistrationError> {
        let wire = protocol::RegistrationNodeInfo::decode(bytes)
            .map_err(|e| RegistrationError::MalformedRequest(e.to_string()))?;
        Self::try_from(wire)
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        protocol::RegistrationNodeInfo::from(self.clone()).encode_to_vec()
    }
}

impl TryFrom<protocol::RegistrationNodeInfo> for RegistrationNodeInfo {
    type Error = RegistrationError;

    fn try_from(wire: protocol::RegistrationNodeInfo) -> Result<Self, Self::Error> {
        if wire.certificate.is_empty() {
            return Err(RegistrationError::MalformedRequest(
                "response carries no certificate".into(),
            ));
        }
        if wire.encrypted_seed.is_empty() {
            return Err(RegistrationError::MalformedRequest(
                "response carries no encrypted seed".into(),
            ));
        }
        Ok(Self::issued(
            Certificate::new(wire.certificate),
            EncryptedSeed::new(wire.encrypted_seed),
        ))
    }
}

impl From<RegistrationNodeInfo> for protocol::RegistrationNodeInfo {
    fn from(info: RegistrationNodeInfo) -> Self {
        Self {
            certificate: info.certificate.into_bytes(),
            encrypted_seed: info.encrypted_seed.into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(certificate: Vec<u8>, encrypted_seed: Vec<u8>) -> Vec<u8> {
        protocol::RegistrationNodeInfo {
            certificate,
            encrypted_seed,
        }
        .encode_to_vec()
    }

    #[test]
    fn test_request_roundtrip() {
        let cert = Certificate::new(vec![1, 2, 3]);
        let bytes = RegistrationNodeInfo::encode_request(&cert);
        assert_eq!(RegistrationNodeInfo::decode_request(&bytes).unwrap(), cert);
    }

    #[test]
    fn test_request_with_seed_rejected() {
        assert!(matches!(
            RegistrationNodeInfo::decode_request(&wire(vec![1], vec![2; 72])),
            Err(RegistrationError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_empty_and_garbage_requests() {
        assert!(matches!(
            RegistrationNodeInfo::decode_request(&[]),
            Err(RegistrationError::MalformedRequest(_))
        ));
        assert!(matches!(
            RegistrationNodeInfo::decode_request(&[0xff, 0xff, 0xff]),
            Err(RegistrationError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_response_fields() {
        let info = RegistrationNodeInfo::issued(
            Certificate::new(vec![7; 10]),
            EncryptedSeed::new(vec![9; 72]),
        );
        let decoded = RegistrationNodeInfo::decode(&info.encode_to_vec()).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.encrypted_seed().len(), 72);
    }

    #[test]
    fn test_response_without_seed_rejected() {
        assert!(matches!(
            RegistrationNodeInfo::decode(&wire(vec![1, 2, 3], Vec::new())),
            Err(RegistrationError::MalformedRequest(_))
        ));
        assert!(matches!(
            RegistrationNodeInfo::decode(&wire(Vec::new(), vec![9; 72])),
            Err(RegistrationError::MalformedRequest(_))
        ));
    }
}
