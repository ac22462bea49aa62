//! Caller identity extracted from gateway headers
//!
//! The upstream gateway authenticates users and forwards `x-principal-id`
//! and `x-principal-role`. The API-key middleware guarantees the request came
//! through that gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::auth::{Principal, Role};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// Extractor for the authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (Some(id), Some(role)) = (
            header(parts, PRINCIPAL_ID_HEADER),
            header(parts, PRINCIPAL_ROLE_HEADER),
        ) else {
            return Err(ApiError::MissingPrincipal);
        };

        let id = Uuid::parse_str(id.trim())
            .map_err(|_| ApiError::InvalidPrincipal("principal id is not a UUID".to_string()))?;
        let role: Role = role
            .parse()
            .map_err(|_| ApiError::InvalidPrincipal(format!("unknown role '{}'", role)))?;

        Ok(Caller(Principal { id, role }))
    }
}
