//! Seed — the network master secret and its distributable envelopes
//!
//! The master seed is a fixed 32-byte secret. It exists in plaintext only inside
//! the seed store and inside attested enclaves; everywhere else it travels as an
//! [`EncryptedSeed`] or wrapped in a [`SeedEnvelope`].

mod material;
pub mod envelope;

pub use material::{EncryptedSeed, SeedError, SeedGeneration, SeedMaterial, SEED_SIZE};
pub use envelope::{EnvelopeError, EnvelopeFormat, SeedEnvelope};
