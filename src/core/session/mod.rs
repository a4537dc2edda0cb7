// src/core/session/mod.rs
pub mod registry;
pub mod store;
pub mod types;

use thiserror::Error;

pub use registry::VerifiedRegistry;
pub use store::{SessionKey, SessionStore};
pub use types::{Session, SessionStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Verification already in progress: {session_id}")]
    AlreadyActive { session_id: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Subject already verified: {0}")]
    AlreadyVerified(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invitation already attached to session {0}")]
    InvitationAlreadySet(String),
}
