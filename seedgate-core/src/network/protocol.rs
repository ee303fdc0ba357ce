//! Seedgate wire protocol messages
//!
//! Protobuf messages exchanged during registration and stored as seed
//! envelopes. Field tags are part of the compatibility surface across node
//! versions and must never be renumbered.
//!
//! The envelopes additionally carry serde derives so the same structures can
//! be read from and written to `seed.json` style files.

use serde::{Deserialize, Serialize};

/// Current seed-distribution envelope
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ::prost::Message)]
pub struct SeedConfig {
    /// Network master public key, hex-encoded
    #[prost(string, tag = "1")]
    pub master_key: ::prost::alloc::string::String,
    /// Sealed master seed, hex-encoded
    #[prost(string, tag = "2")]
    pub encrypted_key: ::prost::alloc::string::String,
    /// Crypto scheme selector
    #[prost(uint32, tag = "3")]
    pub version: u32,
}

/// Seed envelope written before `SeedConfig` existed
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ::prost::Message)]
pub struct LegacySeedConfig {
    /// Legacy identity of the network master key, hex-encoded
    #[prost(string, tag = "1")]
    pub master_cert: ::prost::alloc::string::String,
    /// Sealed master seed under the legacy scheme, hex-encoded
    #[prost(string, tag = "2")]
    pub encrypted_key: ::prost::alloc::string::String,
}

/// Join record: attestation evidence plus the seed sealed to its key.
///
/// A request carries only `certificate`; the response carries both.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct RegistrationNodeInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub certificate: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub encrypted_seed: ::prost::alloc::vec::Vec<u8>,
}

/// Signed attestation report, the content of a registration certificate
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct AttestationReport {
    /// Serialized [`ReportBody`]
    #[prost(bytes = "vec", tag = "1")]
    pub body: ::prost::alloc::vec::Vec<u8>,
    /// Ed25519 signature over `body`
    #[prost(bytes = "vec", tag = "2")]
    pub signature: ::prost::alloc::vec::Vec<u8>,
    /// Ed25519 verifying key of the attestation authority
    #[prost(bytes = "vec", tag = "3")]
    pub authority_key: ::prost::alloc::vec::Vec<u8>,
}

/// Enclave claims covered by the report signature
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ReportBody {
    #[prost(bytes = "vec", tag = "1")]
    pub mr_enclave: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub mr_signer: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint32, tag = "3")]
    pub isv_svn: u32,
    /// First 32 bytes: the enclave's X25519 public key
    #[prost(bytes = "vec", tag = "4")]
    pub report_data: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub platform_id: ::prost::alloc::vec::Vec<u8>,
    /// Unix seconds
    #[prost(int64, tag = "6")]
    pub issued_at: i64,
}
