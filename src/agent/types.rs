// src/agent/types.rs
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::config::VerificationConfig;

/// Result of creating an out-of-band invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub connection_id: String,
    /// Opaque payload the wallet consumes (rendered as a QR code elsewhere).
    pub invitation_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    /// Any state short of active; carries the agent's raw state name.
    Pending(String),
}

impl ConnectionState {
    pub fn from_agent(state: &str) -> Self {
        match state {
            "active" => ConnectionState::Active,
            other => ConnectionState::Pending(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofState {
    Pending(String),
    Done,
    /// The holder declined or the exchange was dropped by the agent.
    Abandoned,
}

impl ProofState {
    pub fn from_agent(state: &str) -> Self {
        match state {
            "done" => ProofState::Done,
            "abandoned" | "request-rejected" => ProofState::Abandoned,
            other => ProofState::Pending(other.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, ProofState::Pending(_))
    }
}

/// Tri-state verification verdict; only meaningful once the exchange is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    NotVerified,
    Unknown,
}

impl Verdict {
    /// The agent reports `verified` either as a JSON boolean or as the strings
    /// `"true"`/`"false"`. Anything else is unknown.
    pub fn from_agent(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Verdict::Verified,
            Some(Value::Bool(false)) => Verdict::NotVerified,
            Some(Value::String(s)) if s == "true" => Verdict::Verified,
            Some(Value::String(s)) if s == "false" => Verdict::NotVerified,
            _ => Verdict::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProofRecord {
    pub state: ProofState,
    pub verdict: Verdict,
    /// Raw `by_format` payload; see `core::proof::extractor`.
    pub presentation: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub cred_def_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRequest {
    pub names: Vec<String>,
    pub restrictions: Vec<Restriction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    Less,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateRequest {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
    pub restrictions: Vec<Restriction>,
}

/// Indy presentation request: revealed attribute groups plus zero-knowledge
/// predicates, each bound to a credential definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequestSpec {
    pub name: String,
    pub version: String,
    pub requested_attributes: BTreeMap<String, AttributeRequest>,
    pub requested_predicates: BTreeMap<String, PredicateRequest>,
}

impl ProofRequestSpec {
    pub fn from_config(config: &VerificationConfig) -> Self {
        let restriction = Restriction {
            cred_def_id: config.cred_def_id.clone(),
        };

        let requested_attributes = config
            .attributes
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    AttributeRequest {
                        names: vec![name.clone()],
                        restrictions: vec![restriction.clone()],
                    },
                )
            })
            .collect();

        let mut requested_predicates = BTreeMap::new();
        requested_predicates.insert(
            format!("age_over_{}", config.minimum_age),
            PredicateRequest {
                name: "age".to_string(),
                p_type: PredicateType::GreaterOrEqual,
                p_value: config.minimum_age,
                restrictions: vec![restriction],
            },
        );

        Self {
            name: config.proof_name.clone(),
            version: config.proof_version.clone(),
            requested_attributes,
            requested_predicates,
        }
    }
}
