//! Contribution API Endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::principal::Caller;
use crate::api::ApiState;
use crate::moderation::{
    Contribution, ContributionDraft, ContributionFilter, ContributionStatus, DecisionReport,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// `pending` (default), `approved`, `rejected` or `all`
    pub status: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<ContributionFilter> {
        let defaults = ContributionFilter::default();
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => defaults.status,
            Some("all") => None,
            Some(raw) => Some(raw.parse::<ContributionStatus>()?),
        };
        Ok(ContributionFilter {
            status,
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// POST /contributions - Submit a price contribution (client)
pub async fn submit_contribution(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Json(draft): Json<ContributionDraft>,
) -> ApiResult<(StatusCode, Json<Contribution>)> {
    let contribution = state.service.submit_contribution(&principal, draft).await?;
    Ok((StatusCode::CREATED, Json(contribution)))
}

/// GET /contributions?status=&limit= - List contributions, newest first (admin)
pub async fn list_contributions(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Contribution>>> {
    let filter = query.into_filter()?;
    let items = state
        .service
        .list_pending_contributions(&principal, filter)
        .await?;
    Ok(Json(items))
}

/// GET /contributions/{id}
pub async fn get_contribution(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Contribution>> {
    Ok(Json(state.service.get_contribution(&principal, id).await?))
}

/// POST /contributions/{id}/approve
pub async fn approve_contribution(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DecisionReport>> {
    Ok(Json(state.service.approve_contribution(&principal, id).await?))
}

/// POST /contributions/{id}/reject
pub async fn reject_contribution(
    State(state): State<ApiState>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<Json<DecisionReport>> {
    let report = state
        .service
        .reject_contribution(&principal, id, &payload.reason)
        .await?;
    Ok(Json(report))
}

/// Create the contributions API router
pub fn create_contributions_router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(submit_contribution).get(list_contributions))
        .route("/{id}", get(get_contribution))
        .route("/{id}/approve", post(approve_contribution))
        .route("/{id}/reject", post(reject_contribution))
        .with_state(state)
}
