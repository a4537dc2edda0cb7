// src/core/services/state_machine.rs
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    agent::{
        client::IdentityAgentClient,
        types::{ConnectionState, ProofRecord, ProofRequestSpec, ProofState, Verdict},
    },
    core::{
        proof,
        services::scheduler::CancelFlag,
        session::{Session, SessionError, SessionKey, SessionStatus, SessionStore, VerifiedRegistry},
    },
    notify::{messages, NotificationSink},
    utils::error::Result,
};

/// What a poll tick left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still in flight; poll again on the next tick.
    Pending,
    /// Reached `Verified` or `Failed`.
    Finished(SessionStatus),
    /// The session was removed or its timer cancelled.
    Gone,
}

/// Drives a session through invitation, connection and proof exchange.
///
/// Every state change is committed to the `SessionStore` before its side
/// effects run, and a commit is refused once the session's timer has been
/// cancelled or the session removed. Agent responses that arrive after a
/// timeout are therefore discarded.
pub struct VerificationStateMachine {
    agent: Arc<dyn IdentityAgentClient>,
    store: Arc<SessionStore>,
    registry: Arc<VerifiedRegistry>,
    sink: Arc<dyn NotificationSink>,
    proof_request: ProofRequestSpec,
    alias_prefix: String,
}

impl VerificationStateMachine {
    pub fn new(
        agent: Arc<dyn IdentityAgentClient>,
        store: Arc<SessionStore>,
        registry: Arc<VerifiedRegistry>,
        sink: Arc<dyn NotificationSink>,
        proof_request: ProofRequestSpec,
        alias_prefix: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            store,
            registry,
            sink,
            proof_request,
            alias_prefix: alias_prefix.into(),
        }
    }

    /// `Initiated` entry: create the invitation and move to
    /// `AwaitingConnection`. On failure the session is dropped and the error
    /// returned to the caller.
    pub async fn initiate(&self, session: &Session, location: String) -> Result<Session> {
        let alias = format!("{}{}", self.alias_prefix, session.subject_id);

        let invitation = match self.agent.create_invitation(&alias).await {
            Ok(invitation) => invitation,
            Err(e) => {
                error!(session_id = %session.session_id, "Failed to create invitation: {}", e);
                self.store.remove(&session.session_id);
                return Err(e.into());
            }
        };

        let attached = self
            .store
            .update(&session.session_id, |s| {
                s.attach_invitation(
                    invitation.connection_id,
                    invitation.invitation_url,
                    location.clone(),
                )
                .map(|_| s.clone())
            })
            .ok_or_else(|| SessionError::NotFound(session.session_id.clone()));

        let session = match attached {
            Ok(Ok(session)) => session,
            Ok(Err(e)) | Err(e) => {
                self.store.remove(&session.session_id);
                return Err(e.into());
            }
        };

        info!(session_id = %session.session_id, subject = %session.subject_id, "Awaiting wallet connection");
        self.send(&session.subject_id, &messages::verification_started(&location))
            .await;

        Ok(session)
    }

    /// One poll tick. Agent failures are logged and leave the session where
    /// it was, to be retried on the next tick.
    pub async fn poll(&self, session_id: &str, cancel: &CancelFlag) -> TickOutcome {
        if cancel.is_cancelled() {
            return TickOutcome::Gone;
        }
        let session = match self.store.get(SessionKey::Id(session_id)) {
            Some(session) => session,
            None => return TickOutcome::Gone,
        };

        match session.status {
            SessionStatus::Initiated => TickOutcome::Pending,
            SessionStatus::AwaitingConnection => self.poll_connection(&session, cancel).await,
            SessionStatus::Connected => self.request_proof(&session, cancel).await,
            SessionStatus::ProofRequested => self.poll_proof(&session, cancel).await,
            status @ (SessionStatus::Verified | SessionStatus::Failed) => {
                TickOutcome::Finished(status)
            }
        }
    }

    /// Deadline handling: removes a session that has not reached a terminal
    /// state and tells the subject. Returns whether anything was removed.
    pub async fn expire(&self, session_id: &str) -> bool {
        let session = match self.store.remove_if(session_id, |s| !s.is_terminal()) {
            Some(session) => session,
            None => return false,
        };

        warn!(
            session_id,
            subject = %session.subject_id,
            status = %session.status,
            "Verification timed out"
        );
        self.send(&session.subject_id, &messages::timed_out()).await;
        true
    }

    /// Status of the session if it has reached `Verified` or `Failed`.
    pub fn finished_status(&self, session_id: &str) -> Option<SessionStatus> {
        self.store
            .get(SessionKey::Id(session_id))
            .map(|s| s.status)
            .filter(|status| status.is_terminal())
    }

    /// Grace-period cleanup for a finished session.
    pub fn retire(&self, session_id: &str) -> bool {
        self.store
            .remove_if(session_id, |s| s.is_terminal())
            .is_some()
    }

    async fn poll_connection(&self, session: &Session, cancel: &CancelFlag) -> TickOutcome {
        let connection_id = match session.connection_id.as_deref() {
            Some(id) => id,
            None => return TickOutcome::Pending,
        };

        match self.agent.get_connection_state(connection_id).await {
            Ok(ConnectionState::Active) => {}
            Ok(ConnectionState::Pending(state)) => {
                debug!(session_id = %session.session_id, %state, "Connection not active yet");
                return TickOutcome::Pending;
            }
            Err(e) => {
                warn!(session_id = %session.session_id, "Connection check failed: {}", e);
                return TickOutcome::Pending;
            }
        }

        let session = match self.commit(&session.session_id, cancel, |s| {
            s.advance(SessionStatus::Connected)
        }) {
            Some(session) => session,
            None => return TickOutcome::Gone,
        };

        info!(session_id = %session.session_id, subject = %session.subject_id, "Wallet connected");
        self.send(&session.subject_id, &messages::connected()).await;

        self.request_proof(&session, cancel).await
    }

    /// `ProofRequested` entry. A failed send keeps the session in `Connected`
    /// so the next tick tries again; the subject hears about the first
    /// failure of a run only.
    async fn request_proof(&self, session: &Session, cancel: &CancelFlag) -> TickOutcome {
        if session.proof_exchange_id.is_some() {
            return TickOutcome::Pending;
        }
        let connection_id = match session.connection_id.as_deref() {
            Some(id) => id,
            None => return TickOutcome::Pending,
        };

        match self
            .agent
            .send_proof_request(connection_id, &self.proof_request)
            .await
        {
            Ok(proof_exchange_id) => {
                let committed = self.commit(&session.session_id, cancel, |s| {
                    s.advance(SessionStatus::ProofRequested)?;
                    s.proof_exchange_id = Some(proof_exchange_id.clone());
                    s.proof_request_failures = 0;
                    Ok(())
                });
                let session = match committed {
                    Some(session) => session,
                    None => return TickOutcome::Gone,
                };

                info!(
                    session_id = %session.session_id,
                    %proof_exchange_id,
                    "Proof request sent"
                );
                self.send(&session.subject_id, &messages::proof_requested())
                    .await;
                TickOutcome::Pending
            }
            Err(e) => {
                warn!(session_id = %session.session_id, "Failed to send proof request: {}", e);
                let failures = match self.commit(&session.session_id, cancel, |s| {
                    s.proof_request_failures += 1;
                    Ok(())
                }) {
                    Some(session) => session.proof_request_failures,
                    None => return TickOutcome::Gone,
                };

                if failures == 1 {
                    self.send(&session.subject_id, &messages::proof_request_failed())
                        .await;
                }
                TickOutcome::Pending
            }
        }
    }

    async fn poll_proof(&self, session: &Session, cancel: &CancelFlag) -> TickOutcome {
        let proof_exchange_id = match session.proof_exchange_id.as_deref() {
            Some(id) => id,
            None => return TickOutcome::Pending,
        };

        let record = match self.agent.get_proof_record(proof_exchange_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(session_id = %session.session_id, "Proof status check failed: {}", e);
                return TickOutcome::Pending;
            }
        };

        if !record.state.is_finished() {
            debug!(session_id = %session.session_id, state = ?record.state, "Proof not finished yet");
            return TickOutcome::Pending;
        }

        if record.state == ProofState::Done && record.verdict == Verdict::Verified {
            self.complete_verified(session, &record, cancel).await
        } else {
            self.complete_failed(session, &record, cancel).await
        }
    }

    async fn complete_verified(
        &self,
        session: &Session,
        record: &ProofRecord,
        cancel: &CancelFlag,
    ) -> TickOutcome {
        let attributes = proof::extract(&record.presentation, &self.proof_request);

        // registered under the store lock, so no new session for this
        // subject can be admitted between the two
        let registry = &self.registry;
        let session = match self.commit(&session.session_id, cancel, |s| {
            s.advance(SessionStatus::Verified)?;
            registry.insert(&s.subject_id);
            Ok(())
        }) {
            Some(session) => session,
            None => return TickOutcome::Gone,
        };

        info!(
            session_id = %session.session_id,
            subject = %session.subject_id,
            attributes = ?attributes.attributes,
            predicates = ?attributes.predicates,
            "Verification completed"
        );

        self.send(&session.subject_id, &messages::verified(&attributes))
            .await;
        if let Err(e) = self
            .sink
            .broadcast(&messages::verified_broadcast(&session.subject_id))
            .await
        {
            warn!("Failed to broadcast verification of {}: {}", session.subject_id, e);
        }
        if let Err(e) = self.sink.grant_benefits(&session.subject_id).await {
            warn!("Failed to grant benefits to {}: {}", session.subject_id, e);
        }

        TickOutcome::Finished(SessionStatus::Verified)
    }

    async fn complete_failed(
        &self,
        session: &Session,
        record: &ProofRecord,
        cancel: &CancelFlag,
    ) -> TickOutcome {
        let session = match self.commit(&session.session_id, cancel, |s| {
            s.advance(SessionStatus::Failed)
        }) {
            Some(session) => session,
            None => return TickOutcome::Gone,
        };

        warn!(
            session_id = %session.session_id,
            subject = %session.subject_id,
            state = ?record.state,
            verdict = ?record.verdict,
            "Verification failed"
        );
        self.send(&session.subject_id, &messages::failed()).await;

        TickOutcome::Finished(SessionStatus::Failed)
    }

    /// Applies `change` to the stored session unless the timer was cancelled
    /// or the session is gone. Returns the updated session.
    fn commit(
        &self,
        session_id: &str,
        cancel: &CancelFlag,
        change: impl FnOnce(&mut Session) -> std::result::Result<(), SessionError>,
    ) -> Option<Session> {
        if cancel.is_cancelled() {
            debug!(session_id, "Timer cancelled, discarding late result");
            return None;
        }

        match self
            .store
            .update(session_id, |s| change(s).map(|_| s.clone()))
        {
            Some(Ok(session)) => Some(session),
            Some(Err(e)) => {
                warn!(session_id, "Refusing state change: {}", e);
                None
            }
            None => {
                debug!(session_id, "Session gone, discarding late result");
                None
            }
        }
    }

    async fn send(&self, subject_id: &str, message: &str) {
        if let Err(e) = self.sink.notify(subject_id, message).await {
            warn!("Failed to notify {}: {}", subject_id, e);
        }
    }
}
