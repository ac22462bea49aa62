//! Blacklist API Endpoints (admin)

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::principal::Caller;
use crate::api::ApiState;
use crate::blacklist::{normalize_contact, BlacklistEntry};

#[derive(Debug, Serialize)]
pub struct BlacklistCheckResponse {
    pub contact: String,
    pub blacklisted: bool,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub deactivated: u64,
}

/// GET /blacklist/check/{contact}
pub async fn check_contact(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(contact): Path<String>,
) -> ApiResult<Json<BlacklistCheckResponse>> {
    let blacklisted = state
        .service
        .is_contact_blacklisted(&principal, &contact)
        .await?;
    Ok(Json(BlacklistCheckResponse {
        contact: normalize_contact(&contact),
        blacklisted,
    }))
}

/// GET /blacklist - Active entries, newest first
pub async fn list_blacklist(
    State(state): State<ApiState>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<BlacklistEntry>>> {
    Ok(Json(state.service.list_blacklist(&principal).await?))
}

/// POST /blacklist/{id}/release
pub async fn release_entry(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BlacklistEntry>> {
    Ok(Json(
        state.service.release_blacklist_entry(&principal, id).await?,
    ))
}

/// POST /blacklist/sweep - Run the expiry sweep now
pub async fn run_sweep(
    State(state): State<ApiState>,
    Caller(principal): Caller,
) -> ApiResult<Json<SweepResponse>> {
    let deactivated = state.service.run_expiry_sweep(&principal).await?;
    Ok(Json(SweepResponse { deactivated }))
}

/// Create the blacklist API router
pub fn create_blacklist_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(list_blacklist))
        .route("/check/{contact}", get(check_contact))
        .route("/{id}/release", post(release_entry))
        .route("/sweep", post(run_sweep))
        .with_state(state)
}
