//! Client account record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::trust::ClientTrustState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub id: Uuid,
    pub name: String,
    /// Digits-only contact identifier (see `blacklist::normalize_contact`)
    pub contact: String,
    pub registered_at: DateTime<Utc>,
    pub trust: ClientTrustState,
}

impl ClientAccount {
    pub fn new(name: String, contact: String, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            contact,
            registered_at,
            trust: ClientTrustState::default(),
        }
    }
}
