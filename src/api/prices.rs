//! Price API Endpoints (public read)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::ApiState;
use crate::pricing::PriceEntry;

/// GET /prices/{product_id}/{market_id}
pub async fn get_price(
    State(state): State<ApiState>,
    Path((product_id, market_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<PriceEntry>> {
    Ok(Json(state.service.get_price(product_id, market_id).await?))
}

/// Create the prices API router
pub fn create_prices_router(state: ApiState) -> Router {
    Router::new()
        .route("/{product_id}/{market_id}", get(get_price))
        .with_state(state)
}
