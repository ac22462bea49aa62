//! HTTP mapping of catalog errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::{CatalogError, ErrorKind};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Principal headers absent on a route that needs a caller
    #[error("missing principal")]
    MissingPrincipal,

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Catalog(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::AlreadyDecided | ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::MissingPrincipal | Self::InvalidPrincipal(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Catalog(err) => match err.kind() {
                ErrorKind::InvalidInput => "invalid_input",
                ErrorKind::NotFound => "not_found",
                ErrorKind::Forbidden => "forbidden",
                ErrorKind::AlreadyDecided => "already_decided",
                ErrorKind::Conflict => "conflict",
                ErrorKind::Unavailable => "unavailable",
            },
            Self::MissingPrincipal | Self::InvalidPrincipal(_) => "unauthenticated",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log
        let message = match &self {
            Self::Catalog(CatalogError::Unavailable(detail)) => {
                error!(detail = %detail, "Storage unavailable");
                "storage temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind_name(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
