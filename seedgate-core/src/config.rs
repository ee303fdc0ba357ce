//! Registration service configuration
//!
//! Loaded from JSON (missing fields take their defaults), optionally
//! overridden from the environment, then validated once at startup.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::tee::attestation::AttestationPolicy;

/// Environment variable overriding [`RegistrationConfig::verification_timeout_ms`]
pub const ENV_VERIFY_TIMEOUT_MS: &str = "SEEDGATE_VERIFY_TIMEOUT_MS";

/// Configuration for the registration service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Upper bound on a single attestation verification (milliseconds)
    pub verification_timeout_ms: u64,
    /// Registrations allowed to run at once
    pub max_concurrent_registrations: usize,
    /// How long a registration waits for a free slot (milliseconds)
    pub permit_wait_ms: u64,
    /// How long the pre-rotation seed stays available (seconds)
    pub legacy_retention_secs: i64,
    pub attestation: AttestationPolicy,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            verification_timeout_ms: 10_000,
            max_concurrent_registrations: 16,
            permit_wait_ms: 30_000,
            legacy_retention_secs: 7 * 24 * 3600,
            attestation: AttestationPolicy::default(),
        }
    }
}

impl RegistrationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_VERIFY_TIMEOUT_MS) {
            self.verification_timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_VERIFY_TIMEOUT_MS}={raw} is not a number"))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_limits()?;
        if self.attestation.trusted_authorities.is_empty() {
            return Err(ConfigError::Invalid(
                "attestation.trusted_authorities is empty; no evidence could ever pass".into(),
            ));
        }
        Ok(())
    }

    /// Checks that hold whatever verifier the service is built around
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.verification_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "verification_timeout_ms must be positive".into(),
            ));
        }
        if self.permit_wait_ms == 0 {
            return Err(ConfigError::Invalid("permit_wait_ms must be positive".into()));
        }
        if self.max_concurrent_registrations == 0
            || self.max_concurrent_registrations > Semaphore::MAX_PERMITS
        {
            return Err(ConfigError::Invalid(format!(
                "max_concurrent_registrations must be in 1..={}",
                Semaphore::MAX_PERMITS
            )));
        }
        self.legacy_retention()?;
        Ok(())
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    pub fn permit_wait(&self) -> Duration {
        Duration::from_millis(self.permit_wait_ms)
    }

    pub fn legacy_retention(&self) -> Result<TimeDelta, ConfigError> {
        if self.legacy_retention_secs < 0 {
            return Err(ConfigError::Invalid(
                "legacy_retention_secs must not be negative".into(),
            ));
        }
        TimeDelta::try_seconds(self.legacy_retention_secs).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "legacy_retention_secs {} is out of range",
                self.legacy_retention_secs
            ))
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_authority() -> RegistrationConfig {
        let mut config = RegistrationConfig::default();
        config.attestation.trusted_authorities = vec!["ab".repeat(32)];
        config
    }

    #[test]
    fn test_defaults() {
        let config = RegistrationConfig::default();
        assert_eq!(config.verification_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent_registrations, 16);
        assert_eq!(config.permit_wait(), Duration::from_secs(30));
        assert_eq!(config.legacy_retention().unwrap(), TimeDelta::days(7));
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = RegistrationConfig::from_json_str(
            r#"{"verification_timeout_ms": 250, "attestation": {"min_svn": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.verification_timeout_ms, 250);
        assert_eq!(config.permit_wait_ms, 30_000);
        assert_eq!(config.attestation.min_svn, 3);
        assert_eq!(config.attestation.max_report_age_secs, 3600);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("seedgate-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string(&with_authority()).unwrap()).unwrap();
        let config = RegistrationConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(config.validate().is_ok());

        assert!(matches!(
            RegistrationConfig::from_file(&path),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(
            RegistrationConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = with_authority()
            .with_overrides(|key| (key == ENV_VERIFY_TIMEOUT_MS).then(|| "1500".to_string()))
            .unwrap();
        assert_eq!(config.verification_timeout_ms, 1500);

        let err = with_authority()
            .with_overrides(|_| Some("soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate() {
        assert!(with_authority().validate().is_ok());
        assert!(RegistrationConfig::default().validate().is_err());

        let mut config = with_authority();
        config.verification_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = with_authority();
        config.max_concurrent_registrations = 0;
        assert!(config.validate().is_err());

        let mut config = with_authority();
        config.permit_wait_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retention_out_of_range_rejected() {
        let mut config = with_authority();
        config.legacy_retention_secs = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(config.legacy_retention(), Err(ConfigError::Invalid(_))));

        config.legacy_retention_secs = -1;
        assert!(config.validate().is_err());
        assert!(config.legacy_retention().is_err());
    }

    #[test]
    fn test_permit_count_bounded() {
        let mut config = with_authority();
        config.max_concurrent_registrations = usize::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_concurrent_registrations = Semaphore::MAX_PERMITS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limits_ignore_authorities() {
        let config = RegistrationConfig::default();
        assert!(config.validate_limits().is_ok());
        assert!(config.validate().is_err());
    }
}
