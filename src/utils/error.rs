// src/utils/error.rs
use thiserror::Error;

use crate::agent::error::AgentError;
use crate::core::session::SessionError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
