// src/agent/mod.rs
pub mod client;
pub mod error;
pub mod types;

pub use client::{AcaPyClient, IdentityAgentClient};
pub use error::AgentError;
pub use types::*;
