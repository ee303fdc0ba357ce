//! Seed envelopes — the two on-disk / on-wire encodings of a sealed seed
//!
//! [`SeedConfig`] and [`LegacySeedConfig`] describe the same thing: a master
//! seed sealed to one enclave, together with the network key it was sealed
//! under. Everything that reads envelopes goes through [`SeedEnvelope`], so the
//! choice between the two, and of the crypto scheme, is made in one place.
//!
//! Discriminants:
//! - JSON: presence of `master_key` (current) vs `master_cert` (legacy)
//! - protobuf: both messages put a string at tag 1, so the `version` field
//!   decides; legacy envelopes never set it and decode with `version == 0`

use prost::Message;
use serde::{Deserialize, Serialize};

use super::material::{EncryptedSeed, SeedError, SeedMaterial};
use crate::network::protocol::{LegacySeedConfig, SeedConfig};
use crate::tee::enclave::{EnclaveKeyPair, EnclavePublicKey};
use crate::tee::secure_channel::SeedScheme;

/// Which envelope encoding to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeFormat {
    Current,
    Legacy,
}

/// A distributable, encrypted master seed in either encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedEnvelope {
    Current(SeedConfig),
    Legacy(LegacySeedConfig),
}

impl SeedEnvelope {
    /// Build a current-format envelope around a sealed seed
    pub fn current(
        master_key: &EnclavePublicKey,
        scheme: SeedScheme,
        sealed: &EncryptedSeed,
    ) -> Self {
        SeedEnvelope::Current(SeedConfig {
            master_key: master_key.to_hex(),
            encrypted_key: sealed.to_hex(),
            version: scheme.version(),
        })
    }

    /// Build a legacy envelope; the seed must be sealed under the legacy scheme
    pub fn legacy(master_key: &EnclavePublicKey, sealed: &EncryptedSeed) -> Self {
        SeedEnvelope::Legacy(LegacySeedConfig {
            master_cert: master_key.to_hex(),
            encrypted_key: sealed.to_hex(),
        })
    }

    /// Decode a protobuf envelope of either kind
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let config = SeedConfig::decode(bytes)?;
        if config.version == 0 {
            let legacy = LegacySeedConfig::decode(bytes)?;
            return Self::checked(SeedEnvelope::Legacy(legacy));
        }
        Self::checked(SeedEnvelope::Current(config))
    }

    /// Decode a JSON envelope of either kind
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let has_key = value.get("master_key").is_some();
        let has_cert = value.get("master_cert").is_some();

        let envelope = match (has_key, has_cert) {
            (true, false) => SeedEnvelope::Current(serde_json::from_value(value)?),
            (false, true) => SeedEnvelope::Legacy(serde_json::from_value(value)?),
            (true, true) => return Err(EnvelopeError::AmbiguousEnvelope),
            (false, false) => return Err(EnvelopeError::MissingField("master_key")),
        };
        Self::checked(envelope)
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            SeedEnvelope::Current(config) => config.encode_to_vec(),
            SeedEnvelope::Legacy(config) => config.encode_to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        let json = match self {
            SeedEnvelope::Current(config) => serde_json::to_string_pretty(config)?,
            SeedEnvelope::Legacy(config) => serde_json::to_string_pretty(config)?,
        };
        Ok(json)
    }

    pub fn format(&self) -> EnvelopeFormat {
        match self {
            SeedEnvelope::Current(_) => EnvelopeFormat::Current,
            SeedEnvelope::Legacy(_) => EnvelopeFormat::Legacy,
        }
    }

    /// Crypto scheme the sealed seed must be opened with
    pub fn scheme(&self) -> Result<SeedScheme, EnvelopeError> {
        match self {
            SeedEnvelope::Current(config) => SeedScheme::from_version(config.version)
                .ok_or(EnvelopeError::UnsupportedVersion(config.version)),
            SeedEnvelope::Legacy(_) => Ok(SeedScheme::Legacy),
        }
    }

    pub fn master_key(&self) -> Result<EnclavePublicKey, EnvelopeError> {
        let (field, encoded) = match self {
            SeedEnvelope::Current(config) => ("master_key", &config.master_key),
            SeedEnvelope::Legacy(config) => ("master_cert", &config.master_cert),
        };
        if encoded.is_empty() {
            return Err(EnvelopeError::MissingField(field));
        }
        let bytes = hex::decode(encoded)?;
        EnclavePublicKey::try_from(bytes.as_slice())
            .map_err(|_| EnvelopeError::InvalidKey(field))
    }

    pub fn encrypted_seed(&self) -> Result<EncryptedSeed, EnvelopeError> {
        let encoded = match self {
            SeedEnvelope::Current(config) => &config.encrypted_key,
            SeedEnvelope::Legacy(config) => &config.encrypted_key,
        };
        if encoded.is_empty() {
            return Err(EnvelopeError::MissingField("encrypted_key"));
        }
        Ok(EncryptedSeed::new(hex::decode(encoded)?))
    }

    /// Open the envelope inside the recipient enclave
    pub fn open(&self, recipient: &EnclaveKeyPair) -> Result<SeedMaterial, EnvelopeError> {
        let scheme = self.scheme()?;
        let master_key = self.master_key()?;
        let sealed = self.encrypted_seed()?;
        Ok(recipient.open_seed(scheme, &master_key, sealed.as_bytes())?)
    }

    /// Re-label a legacy envelope in the current format.
    ///
    /// The ciphertext is untouched; the version records that it still needs the
    /// legacy scheme.
    pub fn migrate(self) -> SeedConfig {
        match self {
            SeedEnvelope::Current(config) => config,
            SeedEnvelope::Legacy(legacy) => SeedConfig {
                master_key: legacy.master_cert,
                encrypted_key: legacy.encrypted_key,
                version: SeedScheme::Legacy.version(),
            },
        }
    }

    fn checked(envelope: Self) -> Result<Self, EnvelopeError> {
        envelope.scheme()?;
        envelope.master_key()?;
        envelope.encrypted_seed()?;
        Ok(envelope)
    }
}

/// Envelope decoding errors
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Unsupported seed config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Missing envelope field: {0}")]
    MissingField(&'static str),

    #[error("Envelope carries both master_key and master_cert")]
    AmbiguousEnvelope,

    #[error("Invalid key in field {0}")]
    InvalidKey(&'static str),

    #[error("Hex decode: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Protobuf decode: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tee::secure_channel::SecureChannel;

    fn sealed_for(
        scheme: SeedScheme,
        seed: &[u8],
    ) -> (EnclaveKeyPair, EnclaveKeyPair, EncryptedSeed) {
        let master = EnclaveKeyPair::generate();
        let node = EnclaveKeyPair::generate();
        let tx = SecureChannel::to_enclave(scheme, master.secret(), &node.public_key()).unwrap();
        let sealed = EncryptedSeed::new(tx.seal(seed).unwrap());
        (master, node, sealed)
    }

    #[test]
    fn test_current_envelope_opens() {
        let (master, node, sealed) = sealed_for(SeedScheme::Current, &[0u8; 32]);
        let env = SeedEnvelope::current(&master.public_key(), SeedScheme::Current, &sealed);

        let decoded = SeedEnvelope::decode(&env.encode_to_vec()).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.format(), EnvelopeFormat::Current);
        assert_eq!(decoded.open(&node).unwrap().as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_legacy_envelope_dispatch() {
        let (master, node, sealed) = sealed_for(SeedScheme::Legacy, &[5u8; 32]);
        let env = SeedEnvelope::legacy(&master.public_key(), &sealed);

        let decoded = SeedEnvelope::decode(&env.encode_to_vec()).unwrap();
        assert!(matches!(decoded, SeedEnvelope::Legacy(_)));
        assert_eq!(decoded.scheme().unwrap(), SeedScheme::Legacy);
        assert_eq!(decoded.open(&node).unwrap().as_bytes(), &[5u8; 32]);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (master, _, sealed) = sealed_for(SeedScheme::Current, &[0u8; 32]);
        let config = SeedConfig {
            master_key: master.public_key().to_hex(),
            encrypted_key: sealed.to_hex(),
            version: 7,
        };

        let err = SeedEnvelope::decode(&config.encode_to_vec()).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion(7)));

        let json = serde_json::to_string(&config).unwrap();
        let err = SeedEnvelope::from_json(&json).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_json_dispatch_by_field() {
        let (master, node, sealed) = sealed_for(SeedScheme::Legacy, &[1u8; 32]);
        let legacy = SeedEnvelope::legacy(&master.public_key(), &sealed);
        let json = legacy.to_json().unwrap();
        assert!(json.contains("master_cert"));

        let decoded = SeedEnvelope::from_json(&json).unwrap();
        assert_eq!(decoded, legacy);
        assert_eq!(decoded.open(&node).unwrap().as_bytes(), &[1u8; 32]);

        let both = r#"{"master_key":"aa","master_cert":"bb","encrypted_key":"cc"}"#;
        assert!(matches!(
            SeedEnvelope::from_json(both),
            Err(EnvelopeError::AmbiguousEnvelope)
        ));
        assert!(matches!(
            SeedEnvelope::from_json(r#"{"encrypted_key":"cc"}"#),
            Err(EnvelopeError::MissingField(_))
        ));
    }

    #[test]
    fn test_migrate_keeps_legacy_scheme() {
        let (master, node, sealed) = sealed_for(SeedScheme::Legacy, &[3u8; 32]);
        let migrated = SeedEnvelope::legacy(&master.public_key(), &sealed).migrate();
        assert_eq!(migrated.version, 1);

        let env = SeedEnvelope::decode(&migrated.encode_to_vec()).unwrap();
        assert!(matches!(env, SeedEnvelope::Current(_)));
        assert_eq!(env.open(&node).unwrap().as_bytes(), &[3u8; 32]);
    }

    #[test]
    fn test_bad_master_key_rejected() {
        let config = SeedConfig {
            master_key: "abcd".into(),
            encrypted_key: "00".into(),
            version: 2,
        };
        let err = SeedEnvelope::decode(&config.encode_to_vec()).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidKey("master_key")));
    }

    #[test]
    fn test_open_with_wrong_enclave_fails() {
        let (master, _, sealed) = sealed_for(SeedScheme::Current, &[0u8; 32]);
        let env = SeedEnvelope::current(&master.public_key(), SeedScheme::Current, &sealed);
        let stranger = EnclaveKeyPair::generate();
        assert!(matches!(
            env.open(&stranger),
            Err(EnvelopeError::Seed(SeedError::Decryption(_)))
        ));
    }
}
