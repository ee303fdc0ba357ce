//! Lifecycle of a single registration attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RegistrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationState {
    Received,
    Verifying,
    Verified,
    SeedIssued,
    Rejected,
}

impl RegistrationState {
    pub fn can_transition_to(self, next: RegistrationState) -> bool {
        use RegistrationState::*;
        matches!(
            (self, next),
            (Received, Verifying)
                // No registration slot freed up in time
                | (Received, Rejected)
                | (Verifying, Verified)
                | (Verifying, Rejected)
                | (Verified, SeedIssued)
                // Issuance failed after verification
                | (Verified, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RegistrationState::SeedIssued | RegistrationState::Rejected
        )
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One pass of one piece of evidence through the state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationAttempt {
    pub id: String,
    state: RegistrationState,
    history: Vec<(RegistrationState, DateTime<Utc>)>,
}

impl RegistrationAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: RegistrationState::Received,
            history: vec![(RegistrationState::Received, Utc::now())],
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn history(&self) -> &[(RegistrationState, DateTime<Utc>)] {
        &self.history
    }

    /// Short id prefix for log lines
    pub fn short_id(&self) -> &str {
        &self.id[..8]
    }

    pub fn advance(&mut self, next: RegistrationState) -> Result<(), RegistrationError> {
        if !self.state.can_transition_to(next) {
            return Err(RegistrationError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push((next, Utc::now()));
        Ok(())
    }
}

impl Default for RegistrationAttempt {
    fn default() -> Self {
        Self::new()
    }
}
