//! Catalog Error Types
//!
//! Every core operation returns either a success payload or a `CatalogError`.
//! The kinds are non-overlapping and survive any transport mapping:
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `InvalidInput` | malformed identifier, non-positive price, missing field |
//! | `NotFound` | referenced contribution, client or blacklist entry absent |
//! | `Forbidden` | blocked client submitting, or insufficient role |
//! | `AlreadyDecided` | decision attempted on a terminal contribution |
//! | `Conflict` | blacklist or existing account prevents registration |
//! | `Unavailable` | persistence layer failure, retried by the caller |

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::moderation::ContributionStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("contribution {id} already decided ({status})")]
    AlreadyDecided { id: Uuid, status: ContributionStatus },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Stable, transport-independent name of an error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Forbidden,
    AlreadyDecided,
    Conflict,
    Unavailable,
}

impl CatalogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidInput(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CatalogError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CatalogError::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CatalogError::NotFound { .. } => ErrorKind::NotFound,
            CatalogError::Forbidden(_) => ErrorKind::Forbidden,
            CatalogError::AlreadyDecided { .. } => ErrorKind::AlreadyDecided,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return CatalogError::Conflict(db_err.message().to_string());
            }
        }
        CatalogError::Unavailable(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
