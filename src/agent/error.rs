// src/agent/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// The agent could not be reached (connect failure, timeout, broken transport).
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    /// The agent answered with a non-success status.
    #[error("Agent rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Unavailable(format!("request timed out: {err}"))
        } else if err.is_connect() {
            AgentError::Unavailable(format!("connection failed: {err}"))
        } else if err.is_decode() {
            AgentError::InvalidResponse(err.to_string())
        } else {
            AgentError::Unavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
