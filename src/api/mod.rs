//! HTTP API for the price catalog
//!
//! Provides REST routers for:
//! - Contributions (submit, list, approve, reject)
//! - Clients (register, block, unblock, terminate)
//! - Blacklist (check, list, release, sweep)
//! - Prices (public read)
//! - Security middleware (auth, rate limiting, headers)
//!
//! The caller's identity arrives in `x-principal-id` / `x-principal-role`
//! headers; see [`principal::Caller`].

pub mod blacklist;
pub mod clients;
pub mod contributions;
pub mod error;
pub mod middleware;
pub mod prices;
pub mod principal;

use axum::{routing::get, Router};

use crate::service::CatalogService;

pub use blacklist::create_blacklist_router;
pub use clients::create_clients_router;
pub use contributions::create_contributions_router;
pub use error::{ApiError, ApiResult};
pub use middleware::{
    auth_middleware, body_size_middleware, default_public_paths, logging_middleware,
    rate_limit_middleware, security_headers_middleware, RateLimiter, SecurityMiddlewareConfig,
    SecurityState,
};
pub use prices::create_prices_router;
pub use principal::{Caller, PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};

/// State shared by every router
#[derive(Clone)]
pub struct ApiState {
    pub service: CatalogService,
}

impl ApiState {
    pub fn new(service: CatalogService) -> Self {
        Self { service }
    }
}

/// All catalog routes, without the security layers
pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .nest("/contributions", create_contributions_router(state.clone()))
        .nest("/clients", create_clients_router(state.clone()))
        .nest("/blacklist", create_blacklist_router(state.clone()))
        .nest("/prices", create_prices_router(state))
        .route("/health", get(|| async { "OK" }))
}
