//! Seed store — the network's master seed and master key
//!
//! Holds the current seed generation, the previous one while a rotation's
//! migration window is open, and the X25519 master key the seed is sealed
//! under. This is the only place plaintext seed material is turned into
//! ciphertext for a recipient.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{Duration, Utc};
use log::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::config::{ConfigError, RegistrationConfig};
use crate::seed::{
    EncryptedSeed, EnvelopeFormat, SeedEnvelope, SeedError, SeedGeneration, SeedMaterial,
};
use crate::tee::enclave::EnclavePublicKey;
use crate::tee::secure_channel::{SecureChannel, SeedScheme};

/// Seed operations the registration flow depends on
pub trait SeedIssuer: Send + Sync {
    /// Snapshot of the active seed; stays valid across concurrent rotations
    fn current_seed(&self) -> Result<Arc<SeedGeneration>, SeedError>;

    /// Seal `seed` so that only the holder of `recipient`'s secret can open it
    fn encrypt_for(
        &self,
        seed: &SeedMaterial,
        recipient: &EnclavePublicKey,
    ) -> Result<EncryptedSeed, SeedError>;
}

#[derive(Default)]
struct SeedSlots {
    current: Option<Arc<SeedGeneration>>,
    legacy: Option<Arc<SeedGeneration>>,
}

pub struct SeedStore {
    master_secret: StaticSecret,
    master_public: EnclavePublicKey,
    slots: RwLock<SeedSlots>,
    /// Held for the whole of a rotation so rotations never interleave
    rotation: Mutex<()>,
    legacy_retention: Duration,
}

impl SeedStore {
    /// Create an uninitialized store around an existing master key
    pub fn new(master_secret: StaticSecret, legacy_retention: Duration) -> Self {
        let master_public = EnclavePublicKey::from(PublicKey::from(&master_secret));
        Self {
            master_secret,
            master_public,
            slots: RwLock::new(SeedSlots::default()),
            rotation: Mutex::new(()),
            legacy_retention,
        }
    }

    /// Create an uninitialized store whose legacy retention comes from `config`
    pub fn from_config(
        master_secret: StaticSecret,
        config: &RegistrationConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(master_secret, config.legacy_retention()?))
    }

    /// Create an uninitialized store with a fresh master key
    pub fn generate(legacy_retention: Duration) -> Self {
        Self::new(
            StaticSecret::random_from_rng(rand::rngs::OsRng),
            legacy_retention,
        )
    }

    /// Network master public key, the anchor recipients open seeds against
    pub fn master_public_key(&self) -> EnclavePublicKey {
        self.master_public
    }

    /// Install the genesis seed
    pub fn initialize(&self, seed: SeedMaterial) -> Result<Arc<SeedGeneration>, SeedError> {
        let _rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.current.is_some() {
            return Err(SeedError::AlreadyInitialized);
        }
        let generation = Arc::new(SeedGeneration {
            seed,
            generation: 1,
            activated_at: Utc::now(),
        });
        slots.current = Some(generation.clone());
        info!(
            "Seed store initialized: master key {}, generation 1",
            self.master_public.short()
        );
        Ok(generation)
    }

    pub fn is_initialized(&self) -> bool {
        self.read_slots().current.is_some()
    }

    /// Replace the active seed, keeping the previous one as legacy.
    ///
    /// Callers that already hold a [`SeedGeneration`] keep encrypting with it;
    /// only later calls to [`SeedStore::current_seed`] see the new seed.
    pub fn rotate_seed(&self, new_seed: SeedMaterial) -> Result<Arc<SeedGeneration>, SeedError> {
        let _rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.read_slots().current.clone();
        let generation = Arc::new(SeedGeneration {
            seed: new_seed,
            generation: previous.as_ref().map_or(1, |p| p.generation + 1),
            activated_at: Utc::now(),
        });

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.legacy = previous;
        slots.current = Some(generation.clone());
        drop(slots);

        info!(
            "Seed rotated to generation {} (legacy retained for {}s)",
            generation.generation,
            self.legacy_retention.num_seconds()
        );
        Ok(generation)
    }

    /// The pre-rotation seed, while still inside the retention window
    pub fn legacy_seed(&self) -> Result<Arc<SeedGeneration>, SeedError> {
        let slots = self.read_slots();
        let (legacy, current) = match (&slots.legacy, &slots.current) {
            (Some(legacy), Some(current)) => (legacy, current),
            _ => return Err(SeedError::LegacyUnavailable),
        };
        // The legacy seed retired when its successor was activated
        if Utc::now() - current.activated_at > self.legacy_retention {
            return Err(SeedError::LegacyUnavailable);
        }
        Ok(legacy.clone())
    }

    /// Drop the legacy seed once its retention window has passed
    pub fn prune_legacy(&self) -> bool {
        let _rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let expired = match (&slots.legacy, &slots.current) {
            (Some(_), Some(current)) => Utc::now() - current.activated_at > self.legacy_retention,
            _ => false,
        };
        if expired {
            slots.legacy = None;
            info!("Pruned legacy seed after retention window");
        }
        expired
    }

    /// Seal a seed to a recipient under an explicit scheme
    pub fn encrypt_with(
        &self,
        scheme: SeedScheme,
        seed: &SeedMaterial,
        recipient: &EnclavePublicKey,
    ) -> Result<EncryptedSeed, SeedError> {
        let channel = SecureChannel::to_enclave(scheme, &self.master_secret, recipient)
            .map_err(SeedError::Encryption)?;
        let sealed = channel
            .seal(seed.as_bytes())
            .map_err(SeedError::Encryption)?;
        debug!(
            "Sealed seed for enclave {} ({:?}, {} bytes)",
            recipient.short(),
            scheme,
            sealed.len()
        );
        Ok(EncryptedSeed::new(sealed))
    }

    /// Build a seed envelope for a recipient from the current seed
    pub fn seed_envelope_for(
        &self,
        recipient: &EnclavePublicKey,
        format: EnvelopeFormat,
    ) -> Result<SeedEnvelope, SeedError> {
        let generation = self.current_seed()?;
        let envelope = match format {
            EnvelopeFormat::Current => {
                let sealed = self.encrypt_with(SeedScheme::Current, &generation.seed, recipient)?;
                SeedEnvelope::current(&self.master_public, SeedScheme::Current, &sealed)
            }
            EnvelopeFormat::Legacy => {
                let sealed = self.encrypt_with(SeedScheme::Legacy, &generation.seed, recipient)?;
                SeedEnvelope::legacy(&self.master_public, &sealed)
            }
        };
        Ok(envelope)
    }

    pub fn summary(&self) -> String {
        let slots = self.read_slots();
        format!(
            "SeedStore | master {} | generation {} | legacy {}",
            self.master_public.short(),
            slots
                .current
                .as_ref()
                .map_or("none".to_string(), |g| g.generation.to_string()),
            slots
                .legacy
                .as_ref()
                .map_or("none".to_string(), |g| g.generation.to_string()),
        )
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, SeedSlots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SeedIssuer for SeedStore {
    fn current_seed(&self) -> Result<Arc<SeedGeneration>, SeedError> {
        self.read_slots()
            .current
            .clone()
            .ok_or(SeedError::Unavailable)
    }

    fn encrypt_for(
        &self,
        seed: &SeedMaterial,
        recipient: &EnclavePublicKey,
    ) -> Result<EncryptedSeed, SeedError> {
        self.encrypt_with(SeedScheme::Current, seed, recipient)
    }
}

impl std::fmt::Debug for SeedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}
