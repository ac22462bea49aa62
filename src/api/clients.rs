//! Client API Endpoints
//!
//! Registration is public; everything else is administrative.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::principal::Caller;
use crate::api::ApiState;
use crate::blacklist::BlacklistEntry;
use crate::clients::{ClientAccount, ClientTrustState};
use crate::service::BlockRequest;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub contact: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockClientRequest {
    Temporary { days: u32, reason: String },
    Permanent { reason: String },
}

impl From<BlockClientRequest> for BlockRequest {
    fn from(req: BlockClientRequest) -> Self {
        match req {
            BlockClientRequest::Temporary { days, reason } => BlockRequest::Temporary { days, reason },
            BlockClientRequest::Permanent { reason } => BlockRequest::Permanent { reason },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    pub reason: String,
}

/// POST /clients/register
pub async fn register_client(
    State(state): State<ApiState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ClientAccount>)> {
    let account = state
        .service
        .register_client(&payload.name, &payload.contact)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /clients/{id}
pub async fn get_client(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientAccount>> {
    Ok(Json(state.service.get_client(&principal, id).await?))
}

/// POST /clients/{id}/block
pub async fn block_client(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<BlockClientRequest>,
) -> ApiResult<Json<ClientTrustState>> {
    let trust = state
        .service
        .block_client(&principal, id, payload.into())
        .await?;
    Ok(Json(trust))
}

/// POST /clients/{id}/unblock
pub async fn unblock_client(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientTrustState>> {
    Ok(Json(state.service.unblock_client(&principal, id).await?))
}

/// DELETE /clients/{id} - Terminate the account and blacklist its contact
pub async fn terminate_client(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<TerminateRequest>,
) -> ApiResult<Json<BlacklistEntry>> {
    let entry = state
        .service
        .terminate_client(&principal, id, &payload.reason)
        .await?;
    Ok(Json(entry))
}

/// Create the clients API router
pub fn create_clients_router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(register_client))
        .route("/{id}", get(get_client).delete(terminate_client))
        .route("/{id}/block", post(block_client))
        .route("/{id}/unblock", post(unblock_client))
        .with_state(state)
}
