// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use ssi_gate::{
    agent::{
        client::IdentityAgentClient,
        error::{AgentError, Result as AgentResult},
        types::{ConnectionState, Invitation, ProofRecord, ProofRequestSpec, ProofState, Verdict},
    },
    core::{
        services::{PollScheduler, VerificationService, VerificationStateMachine},
        session::{SessionKey, SessionStatus, SessionStore, VerifiedRegistry},
    },
    notify::{NotificationSink, NotifyError},
    utils::config::VerificationConfig,
};

pub const ALIAS_PREFIX: &str = "Minecraft-Player-";

pub fn connection_for(subject: &str) -> String {
    format!("conn-{}{}", ALIAS_PREFIX, subject)
}

/// Agent double whose answers are scripted per connection. Once a script
/// runs dry, connections stay pending and proofs stay in `request-sent`.
#[derive(Default)]
pub struct ScriptedAgent {
    connections: Mutex<HashMap<String, VecDeque<AgentResult<ConnectionState>>>>,
    proof_requests: Mutex<HashMap<String, VecDeque<AgentResult<String>>>>,
    proofs: Mutex<HashMap<String, VecDeque<AgentResult<ProofRecord>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_connection(&self, subject: &str, answers: Vec<AgentResult<ConnectionState>>) {
        self.connections
            .lock()
            .insert(connection_for(subject), answers.into());
    }

    pub fn script_proof_request(&self, subject: &str, answers: Vec<AgentResult<String>>) {
        self.proof_requests
            .lock()
            .insert(connection_for(subject), answers.into());
    }

    pub fn script_proof(&self, subject: &str, answers: Vec<AgentResult<ProofRecord>>) {
        self.proofs
            .lock()
            .insert(proof_exchange_for(subject), answers.into());
    }

    /// Every call concerning `subject` takes `delay` before answering.
    pub fn stall(&self, subject: &str, delay: Duration) {
        self.delays.lock().insert(connection_for(subject), delay);
    }

    pub fn calls_for(&self, subject: &str) -> usize {
        let connection = connection_for(subject);
        let exchange = proof_exchange_for(subject);
        self.calls
            .lock()
            .iter()
            .filter(|call| call.ends_with(&connection) || call.ends_with(&exchange))
            .count()
    }

    async fn delay(&self, connection_id: &str) {
        let delay = self.delays.lock().get(connection_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn proof_exchange_for(subject: &str) -> String {
    format!("pres-{}", connection_for(subject))
}

#[async_trait]
impl IdentityAgentClient for ScriptedAgent {
    async fn create_invitation(&self, alias: &str) -> AgentResult<Invitation> {
        let connection_id = format!("conn-{}", alias);
        self.calls.lock().push(format!("invitation {}", connection_id));
        self.delay(&connection_id).await;
        Ok(Invitation {
            invitation_url: format!("https://agent.example/?oob={}", connection_id),
            connection_id,
        })
    }

    async fn get_connection_state(&self, connection_id: &str) -> AgentResult<ConnectionState> {
        self.calls.lock().push(format!("connection {}", connection_id));
        self.delay(connection_id).await;
        self.connections
            .lock()
            .get_mut(connection_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(ConnectionState::Pending("invitation".into())))
    }

    async fn send_proof_request(
        &self,
        connection_id: &str,
        _spec: &ProofRequestSpec,
    ) -> AgentResult<String> {
        self.calls.lock().push(format!("proof-request {}", connection_id));
        self.delay(connection_id).await;
        self.proof_requests
            .lock()
            .get_mut(connection_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(format!("pres-{}", connection_id)))
    }

    async fn get_proof_record(&self, proof_exchange_id: &str) -> AgentResult<ProofRecord> {
        self.calls.lock().push(format!("proof {}", proof_exchange_id));
        let connection_id = proof_exchange_id.trim_start_matches("pres-").to_string();
        self.delay(&connection_id).await;
        self.proofs
            .lock()
            .get_mut(proof_exchange_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(pending_proof()))
    }
}

pub fn unavailable() -> AgentError {
    AgentError::Unavailable("connection refused".into())
}

pub fn pending_proof() -> ProofRecord {
    ProofRecord {
        state: ProofState::Pending("request-sent".into()),
        verdict: Verdict::Unknown,
        presentation: Value::Null,
    }
}

pub fn finished_proof(verified: bool, department: &str) -> ProofRecord {
    ProofRecord {
        state: ProofState::Done,
        verdict: if verified { Verdict::Verified } else { Verdict::NotVerified },
        presentation: json!({
            "pres": {
                "indy": {
                    "requested_proof": {
                        "revealed_attr_groups": {
                            "department": {
                                "values": { "department": { "raw": department } }
                            }
                        },
                        "predicates": { "age_over_18": { "sub_proof_index": 0 } }
                    }
                }
            }
        }),
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<(String, String)>>,
    broadcasts: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn notices_for(&self, subject: &str) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, subject_id: &str, message: &str) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .push((subject_id.to_string(), message.to_string()));
        Ok(())
    }

    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        self.broadcasts.lock().push(message.to_string());
        Ok(())
    }
}

pub struct TestContext {
    pub agent: Arc<ScriptedAgent>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<SessionStore>,
    pub registry: Arc<VerifiedRegistry>,
    pub scheduler: Arc<PollScheduler>,
    pub service: VerificationService,
}

impl TestContext {
    /// 3s cadence, 30s grace and the given session timeout.
    pub fn new(session_timeout: Duration) -> Self {
        Self::with_timing(session_timeout, Duration::from_secs(3), Duration::from_secs(30))
    }

    pub fn with_timing(
        session_timeout: Duration,
        poll_interval: Duration,
        grace_period: Duration,
    ) -> Self {
        let agent = Arc::new(ScriptedAgent::new());
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(SessionStore::new());
        let registry = Arc::new(VerifiedRegistry::new());

        let machine = Arc::new(VerificationStateMachine::new(
            agent.clone(),
            store.clone(),
            registry.clone(),
            sink.clone(),
            ProofRequestSpec::from_config(&VerificationConfig::default()),
            ALIAS_PREFIX,
        ));
        let scheduler = Arc::new(PollScheduler::new(
            machine.clone(),
            poll_interval,
            grace_period,
        ));
        let service = VerificationService::new(
            store.clone(),
            registry.clone(),
            machine,
            scheduler.clone(),
            session_timeout,
            "http://localhost:8080",
        );

        Self {
            agent,
            sink,
            store,
            registry,
            scheduler,
            service,
        }
    }

    pub fn status_of(&self, subject: &str) -> Option<SessionStatus> {
        self.store.get(SessionKey::Subject(subject)).map(|s| s.status)
    }
}

/// Lets paused time run forward, giving timers and ticks a chance to fire.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
