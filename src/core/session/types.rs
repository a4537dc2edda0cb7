// src/core/session/types.rs
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::SessionError;

/// Lifecycle of one verification session, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Initiated,
    AwaitingConnection,
    Connected,
    ProofRequested,
    Verified,
    Failed,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            SessionStatus::Initiated => 0,
            SessionStatus::AwaitingConnection => 1,
            SessionStatus::Connected => 2,
            SessionStatus::ProofRequested => 3,
            SessionStatus::Verified | SessionStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Verified | SessionStatus::Failed)
    }

    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initiated => "initiated",
            SessionStatus::AwaitingConnection => "awaiting-connection",
            SessionStatus::Connected => "connected",
            SessionStatus::ProofRequested => "proof-requested",
            SessionStatus::Verified => "verified",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub subject_id: String,
    pub connection_id: Option<String>,
    pub proof_exchange_id: Option<String>,
    invitation_payload: Option<String>,
    /// Where the holder can fetch the invitation (QR page).
    pub invitation_location: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    pub deadline: Instant,
    /// Consecutive proof-request send failures since the last success.
    pub proof_request_failures: u32,
}

impl Session {
    pub fn new(session_id: String, subject_id: String, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            subject_id,
            connection_id: None,
            proof_exchange_id: None,
            invitation_payload: None,
            invitation_location: None,
            status: SessionStatus::Initiated,
            created_at: now,
            last_transition_at: now,
            deadline: Instant::now() + timeout,
            proof_request_failures: 0,
        }
    }

    pub fn invitation_payload(&self) -> Option<&str> {
        self.invitation_payload.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn advance(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if !self.status.can_advance_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.last_transition_at = Utc::now();
        Ok(())
    }

    /// Records the agent's invitation and moves to `AwaitingConnection`.
    /// The payload can only be set once.
    pub fn attach_invitation(
        &mut self,
        connection_id: String,
        payload: String,
        location: String,
    ) -> Result<(), SessionError> {
        if self.invitation_payload.is_some() {
            return Err(SessionError::InvitationAlreadySet(self.session_id.clone()));
        }
        self.advance(SessionStatus::AwaitingConnection)?;
        self.connection_id = Some(connection_id);
        self.invitation_payload = Some(payload);
        self.invitation_location = Some(location);
        Ok(())
    }
}
