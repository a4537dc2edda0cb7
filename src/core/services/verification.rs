// src/core/services/verification.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    core::{
        services::{scheduler::PollScheduler, state_machine::VerificationStateMachine},
        session::{SessionError, SessionKey, SessionStatus, SessionStore, VerifiedRegistry},
    },
    utils::error::{GateError, Result},
};

/// Result of asking to verify a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationRequest {
    AlreadyVerified,
    Started {
        session_id: String,
        invitation_url: String,
    },
    /// `invitation_url` stays empty until the agent's invitation is attached.
    InProgress {
        session_id: String,
        invitation_url: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub invitation_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub subject_id: String,
    pub verified: bool,
    pub session: Option<SessionSummary>,
}

/// Entry point for verification requests. Opens sessions, hands them to the
/// state machine and keeps one timer per live session.
pub struct VerificationService {
    store: Arc<SessionStore>,
    registry: Arc<VerifiedRegistry>,
    machine: Arc<VerificationStateMachine>,
    scheduler: Arc<PollScheduler>,
    session_timeout: Duration,
    public_url: String,
}

impl VerificationService {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<VerifiedRegistry>,
        machine: Arc<VerificationStateMachine>,
        scheduler: Arc<PollScheduler>,
        session_timeout: Duration,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            machine,
            scheduler,
            session_timeout,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn request_verification(&self, subject_id: &str) -> Result<VerificationRequest> {
        validate_subject(subject_id)?;

        if self.registry.contains(subject_id) {
            info!("{} is already verified", subject_id);
            return Ok(VerificationRequest::AlreadyVerified);
        }

        let registry = &self.registry;
        let created = self
            .store
            .create_unless(subject_id, self.session_timeout, |s| registry.contains(s));

        let session = match created {
            Ok(session) => session,
            Err(SessionError::AlreadyVerified(_)) => {
                info!("{} was verified concurrently", subject_id);
                return Ok(VerificationRequest::AlreadyVerified);
            }
            Err(SessionError::AlreadyActive { session_id }) => {
                info!(%session_id, "Verification already in progress for {}", subject_id);
                let invitation_url = self
                    .store
                    .get(SessionKey::Id(&session_id))
                    .and_then(|s| s.invitation_location);
                return Ok(VerificationRequest::InProgress {
                    session_id,
                    invitation_url,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let location = self.invitation_location(&session.session_id);
        let session = self.machine.initiate(&session, location.clone()).await?;
        self.scheduler.start(&session.session_id, session.deadline);

        info!(session_id = %session.session_id, "Verification started for {}", subject_id);
        Ok(VerificationRequest::Started {
            session_id: session.session_id,
            invitation_url: location,
        })
    }

    pub fn status(&self, subject_id: &str) -> StatusReport {
        let session = self
            .store
            .get(SessionKey::Subject(subject_id))
            .map(|s| SessionSummary {
                session_id: s.session_id,
                status: s.status,
                invitation_url: s.invitation_location,
                created_at: s.created_at,
            });

        StatusReport {
            subject_id: subject_id.to_string(),
            verified: self.registry.contains(subject_id),
            session,
        }
    }

    /// Raw invitation for the wallet, served at the session's invitation URL.
    pub fn invitation_payload(&self, session_id: &str) -> Option<String> {
        self.store
            .get(SessionKey::Id(session_id))
            .and_then(|s| s.invitation_payload().map(str::to_string))
    }

    pub fn verified_subjects(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    fn invitation_location(&self, session_id: &str) -> String {
        format!("{}/invitation/{}", self.public_url, session_id)
    }
}

/// Subject ids end up inside commands on the notification channel, so only
/// printable, whitespace-free names are accepted.
fn validate_subject(subject_id: &str) -> Result<()> {
    if subject_id.is_empty() {
        return Err(GateError::InvalidRequest("subject id must not be empty".into()));
    }
    if subject_id
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '\\')
    {
        return Err(GateError::InvalidRequest(format!(
            "subject id contains invalid characters: {:?}",
            subject_id
        )));
    }
    Ok(())
}
