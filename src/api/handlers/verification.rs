use actix_web::{
    web::{self, Data, Json, Path},
    HttpResponse, Scope,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    core::services::verification::{VerificationRequest, VerificationService},
    utils::error::GateError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPlayerRequest {
    pub player_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum VerifyPlayerResponse {
    #[serde(rename_all = "camelCase")]
    AlreadyVerified { already_verified: bool },
    #[serde(rename_all = "camelCase")]
    InProgress {
        in_progress: bool,
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        invitation_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Started {
        session_id: String,
        invitation_url: String,
    },
}

impl From<VerificationRequest> for VerifyPlayerResponse {
    fn from(request: VerificationRequest) -> Self {
        match request {
            VerificationRequest::AlreadyVerified => Self::AlreadyVerified {
                already_verified: true,
            },
            VerificationRequest::InProgress {
                session_id,
                invitation_url,
            } => Self::InProgress {
                in_progress: true,
                session_id,
                invitation_url,
            },
            VerificationRequest::Started {
                session_id,
                invitation_url,
            } => Self::Started {
                session_id,
                invitation_url,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn scope() -> Scope {
    web::scope("")
        .service(web::resource("/verify-player").route(web::post().to(verify_player)))
        .service(web::resource("/status/{subject}").route(web::get().to(get_status)))
        .service(web::resource("/invitation/{session_id}").route(web::get().to(get_invitation)))
        .service(web::resource("/verified").route(web::get().to(list_verified)))
}

async fn verify_player(
    service: Data<Arc<VerificationService>>,
    request: Json<VerifyPlayerRequest>,
) -> HttpResponse {
    info!("Received verification request for {}", request.player_name);

    match service.request_verification(&request.player_name).await {
        Ok(outcome) => HttpResponse::Ok().json(VerifyPlayerResponse::from(outcome)),
        Err(GateError::InvalidRequest(reason)) => {
            warn!("Rejected verification request: {}", reason);
            HttpResponse::BadRequest().json(ErrorBody { error: reason })
        }
        Err(e @ GateError::Agent(_)) => {
            error!("Verification for {} could not start: {}", request.player_name, e);
            HttpResponse::BadGateway().json(ErrorBody { error: e.to_string() })
        }
        Err(e) => {
            error!("Verification for {} could not start: {}", request.player_name, e);
            HttpResponse::InternalServerError().json(ErrorBody { error: e.to_string() })
        }
    }
}

async fn get_status(
    service: Data<Arc<VerificationService>>,
    subject: Path<String>,
) -> HttpResponse {
    HttpResponse::Ok().json(service.status(&subject))
}

async fn get_invitation(
    service: Data<Arc<VerificationService>>,
    session_id: Path<String>,
) -> HttpResponse {
    match service.invitation_payload(&session_id) {
        Some(payload) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(payload),
        None => {
            warn!("Invitation for {} not found", session_id);
            HttpResponse::NotFound().json(ErrorBody {
                error: "Invitation not found".into(),
            })
        }
    }
}

async fn list_verified(service: Data<Arc<VerificationService>>) -> HttpResponse {
    HttpResponse::Ok().json(service.verified_subjects())
}
