// src/agent/client.rs
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::{AgentError, Result};
use super::types::{ConnectionState, Invitation, ProofRecord, ProofRequestSpec, ProofState, Verdict};
use crate::utils::config::AgentConfig;

const DIDEXCHANGE_PROTOCOL: &str = "https://didcomm.org/didexchange/1.0";

/// The four round trips the verification flow needs from the remote agent.
#[async_trait]
pub trait IdentityAgentClient: Send + Sync {
    async fn create_invitation(&self, alias: &str) -> Result<Invitation>;

    async fn get_connection_state(&self, connection_id: &str) -> Result<ConnectionState>;

    /// Returns the identifier of the new proof exchange.
    async fn send_proof_request(
        &self,
        connection_id: &str,
        spec: &ProofRequestSpec,
    ) -> Result<String>;

    async fn get_proof_record(&self, proof_exchange_id: &str) -> Result<ProofRecord>;
}

/// HTTP client for an ACA-Py admin API.
#[derive(Clone)]
pub struct AcaPyClient {
    http_client: Client,
    admin_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateInvitationRequest<'a> {
    alias: &'a str,
    handshake_protocols: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct CreateInvitationResponse {
    #[serde(default)]
    connection_id: Option<String>,
    invitation_url: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionResponse {
    state: String,
}

#[derive(Debug, Serialize)]
struct SendProofRequest<'a> {
    connection_id: &'a str,
    presentation_request: PresentationRequest<'a>,
}

#[derive(Debug, Serialize)]
struct PresentationRequest<'a> {
    indy: &'a ProofRequestSpec,
}

#[derive(Debug, Deserialize)]
struct SendProofResponse {
    pres_ex_id: String,
}

#[derive(Debug, Deserialize)]
struct ProofRecordResponse {
    state: String,
    #[serde(default)]
    verified: Option<Value>,
    #[serde(default)]
    by_format: Value,
}

impl AcaPyClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(config.get_connect_timeout())
            .timeout(config.get_request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            admin_url: config.admin_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.admin_url, path));

        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AgentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityAgentClient for AcaPyClient {
    async fn create_invitation(&self, alias: &str) -> Result<Invitation> {
        let body = CreateInvitationRequest {
            alias,
            handshake_protocols: [DIDEXCHANGE_PROTOCOL],
        };

        let response = self
            .request(Method::POST, "/out-of-band/create-invitation")
            .json(&body)
            .send()
            .await?;
        let created: CreateInvitationResponse = Self::read_json(response).await?;

        let connection_id = created.connection_id.ok_or_else(|| {
            AgentError::InvalidResponse("invitation response carries no connection_id".into())
        })?;

        debug!(%connection_id, alias, "Created invitation");
        Ok(Invitation {
            connection_id,
            invitation_url: created.invitation_url,
        })
    }

    async fn get_connection_state(&self, connection_id: &str) -> Result<ConnectionState> {
        let response = self
            .request(Method::GET, &format!("/connections/{connection_id}"))
            .send()
            .await?;
        let connection: ConnectionResponse = Self::read_json(response).await?;

        Ok(ConnectionState::from_agent(&connection.state))
    }

    async fn send_proof_request(
        &self,
        connection_id: &str,
        spec: &ProofRequestSpec,
    ) -> Result<String> {
        let body = SendProofRequest {
            connection_id,
            presentation_request: PresentationRequest { indy: spec },
        };

        let response = self
            .request(Method::POST, "/present-proof-2.0/send-request")
            .json(&body)
            .send()
            .await?;
        let sent: SendProofResponse = Self::read_json(response).await?;

        Ok(sent.pres_ex_id)
    }

    async fn get_proof_record(&self, proof_exchange_id: &str) -> Result<ProofRecord> {
        let response = self
            .request(
                Method::GET,
                &format!("/present-proof-2.0/records/{proof_exchange_id}"),
            )
            .send()
            .await?;
        let record: ProofRecordResponse = Self::read_json(response).await?;

        Ok(ProofRecord {
            state: ProofState::from_agent(&record.state),
            verdict: Verdict::from_agent(record.verified.as_ref()),
            presentation: record.by_format,
        })
    }
}
