//! Network-facing wire messages

pub mod protocol;

pub use protocol::{
    AttestationReport, LegacySeedConfig, RegistrationNodeInfo, ReportBody, SeedConfig,
};
