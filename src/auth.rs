//! Authenticated principals
//!
//! Token issuance and password checks happen upstream. The core only sees
//! an already-verified principal carrying an identity and a role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            other => Err(CatalogError::invalid(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn client(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Client,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn require_admin(&self) -> CatalogResult<Uuid> {
        match self.role {
            Role::Admin => Ok(self.id),
            Role::Client => Err(CatalogError::forbidden("administrator role required")),
        }
    }

    pub fn require_client(&self) -> CatalogResult<Uuid> {
        match self.role {
            Role::Client => Ok(self.id),
            Role::Admin => Err(CatalogError::forbidden("client role required")),
        }
    }
}
